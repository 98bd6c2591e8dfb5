use crate::poisson::{poisson_pmf, poisson_survival};
use ndarray::Array2;

/// Below this energy density the rates are evaluated as if the density were
/// exactly this value, which keeps the `1 / e_av` time scaling finite.
pub const ENERGY_FLOOR: f64 = 1e-12;

/// Global quantities of the current state that the rate models depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PassSummary {
    /// Mean number of violated factor nodes per variable (`e_av`).
    pub energy_density: f64,
    /// Mean probability that a factor node is violated.
    pub unsat_fraction: f64,
}

/// Transition rates of a local search heuristic.
pub trait RateModel: Sync {
    /// Called once per derivative pass, before any `rate` call.
    fn prepare(&mut self, summary: &PassSummary);

    /// Flip rate of a variable of connectivity `degree` that violates `before`
    /// factor nodes and would violate `after` of them once flipped.
    fn rate(&self, before: usize, after: usize, degree: usize) -> f64;
}

/// Focused Metropolis Search: a variable of a violated clause is picked with
/// probability `E0 / K`, and an uphill move of `dE` is accepted with `eta^dE`.
pub fn fms_rate(e0: usize, e1: usize, arity: usize, eta: f64) -> f64 {
    let base = e0 as f64 / arity as f64;
    if e1 > e0 {
        base * eta.powi((e1 - e0) as i32)
    } else {
        base
    }
}

#[derive(Debug, Clone)]
pub struct FmsRateTable {
    arity: usize,
    eta: f64,
    table: Array2<f64>,
}

impl FmsRateTable {
    pub fn new(max_count: usize, arity: usize, eta: f64) -> Self {
        let table = Array2::from_shape_fn((max_count + 1, max_count + 1), |(e0, e1)| {
            fms_rate(e0, e1, arity, eta)
        });
        Self { arity, eta, table }
    }

    pub fn max_count(&self) -> usize {
        self.table.nrows() - 1
    }

    pub fn get(&self, e0: usize, e1: usize) -> f64 {
        match self.table.get((e0, e1)) {
            Some(&rate) => rate,
            None => fms_rate(e0, e1, self.arity, self.eta),
        }
    }
}

/// FMS rates in units of the current energy density.
#[derive(Debug, Clone)]
pub struct FmsRates {
    table: FmsRateTable,
    inv_energy: f64,
}

impl FmsRates {
    pub fn new(table: FmsRateTable) -> Self {
        Self {
            table,
            inv_energy: 1.0,
        }
    }
}

impl RateModel for FmsRates {
    fn prepare(&mut self, summary: &PassSummary) {
        self.inv_energy = 1.0 / summary.energy_density.max(ENERGY_FLOOR);
    }

    fn rate(&self, before: usize, after: usize, _degree: usize) -> f64 {
        self.table.get(before, after) * self.inv_energy
    }
}

/// Probability that the greedy step of WalkSAT picks the source variable among
/// the `arity` variables of a violated clause.
///
/// Every other variable either ties with the source (probability `tie`) or is
/// strictly worse (probability `above`); ties are broken uniformly.
pub fn walksat_greedy_weight(arity: usize, tie: f64, above: f64) -> f64 {
    let others = arity.saturating_sub(1);
    let mut total = 0.0;
    for pattern in 0..(1usize << others) {
        let mut prod = 1.0;
        let mut ties = 0;
        for w in 0..others {
            if (pattern >> w) & 1 == 0 {
                prod *= tie;
                ties += 1;
            } else {
                prod *= above;
            }
        }
        total += prod / (ties + 1) as f64;
    }
    total
}

pub fn walksat_rate(e0: usize, greedy_weight: f64, arity: usize, q: f64, energy: f64) -> f64 {
    if e0 == 0 {
        return 0.0;
    }
    e0 as f64 * (q / arity as f64 + (1.0 - q) * greedy_weight) / energy.max(ENERGY_FLOOR)
}

/// WalkSAT rates with the neighbours' satisfied-clause counts drawn from a
/// Poisson law of mean `(1 - pu_av) * mean_degree`.
#[derive(Debug, Clone)]
pub struct WalkSatRates {
    arity: usize,
    q: f64,
    mean_degree: f64,
    pmf: Vec<f64>,
    survival: Vec<f64>,
    greedy: Vec<f64>,
    energy: f64,
}

impl WalkSatRates {
    pub fn new(arity: usize, q: f64, max_degree: usize, mean_degree: f64) -> Self {
        let mut rates = Self {
            arity,
            q,
            mean_degree,
            pmf: vec![0.0; max_degree + 1],
            survival: vec![0.0; max_degree + 1],
            greedy: vec![0.0; max_degree + 1],
            energy: 1.0,
        };
        rates.refresh(0.0);
        rates
    }

    /// Recomputes the Poisson tables for a new mean violated-clause probability.
    pub fn refresh(&mut self, unsat_fraction: f64) {
        let mean = (1.0 - unsat_fraction) * self.mean_degree;
        for s in 0..self.pmf.len() {
            self.pmf[s] = poisson_pmf(s, mean);
            self.survival[s] = poisson_survival(s, mean);
            self.greedy[s] = walksat_greedy_weight(self.arity, self.pmf[s], self.survival[s]);
        }
    }

    pub fn pmf(&self) -> &[f64] {
        &self.pmf
    }

    pub fn survival(&self) -> &[f64] {
        &self.survival
    }

    pub fn greedy_weight(&self, satisfied: usize) -> f64 {
        self.greedy[satisfied]
    }
}

impl RateModel for WalkSatRates {
    fn prepare(&mut self, summary: &PassSummary) {
        self.refresh(summary.unsat_fraction);
        self.energy = summary.energy_density;
    }

    fn rate(&self, before: usize, _after: usize, degree: usize) -> f64 {
        let satisfied = degree.saturating_sub(before);
        walksat_rate(before, self.greedy[satisfied], self.arity, self.q, self.energy)
    }
}
