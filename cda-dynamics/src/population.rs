use crate::{
    derivative::{accumulate, flip_totals, CavityCounts, MasterEquation},
    poisson::{max_cavity_size, poisson_sample},
    rates::{FmsRateTable, FmsRates, PassSummary, RateModel},
    state::{
        average_replicas, compute_conditionals, mean_unsat, population_energy,
        replicated_product_joint,
    },
};
use anyhow::{anyhow, Result};
use cda_instances::graph::MAX_ARITY;
use cda_utils::derive_seed;
use ndarray::{Array2, Array3, ArrayView2, ArrayViewMut2, Zip};
use rand::{
    rngs::{SmallRng, StdRng},
    Rng, SeedableRng,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PopulationParams {
    /// Replicas per unsat class.
    pub pop_size: usize,
    /// Clause to variable ratio.
    pub alpha: f64,
    pub arity: usize,
    pub eta: f64,
    /// Cavity sizes are capped where the Poisson survival drops below this.
    pub cavity_threshold: f64,
    pub p0: f64,
}

/// FMS master equation on an ensemble of replicas of every unsat class, with
/// cavity neighbourhoods resampled from the replica averages on each pass.
pub struct PopulationDynamics {
    params: PopulationParams,
    seed: [u8; 32],
    pass: u64,
    max_cavity: usize,
    rates: FmsRates,
    class_patterns: Vec<usize>,
    conditionals: Array3<f64>,
    cavity_sizes: Array2<usize>,
}

impl PopulationDynamics {
    pub fn new(seed: [u8; 32], params: PopulationParams) -> Result<Self> {
        if params.arity == 0 || params.arity > MAX_ARITY {
            return Err(anyhow!(
                "Invalid clause arity. Expected 1..={}, Actual: {}",
                MAX_ARITY,
                params.arity
            ));
        }
        if params.pop_size == 0 {
            return Err(anyhow!("Population size must be positive"));
        }
        if !(params.alpha >= 0.0) {
            return Err(anyhow!("Invalid clause density {}", params.alpha));
        }
        let mean = params.alpha * params.arity as f64;
        let max_cavity = max_cavity_size(mean, params.cavity_threshold);
        let classes = 1 << params.arity;
        Ok(Self {
            rates: FmsRates::new(FmsRateTable::new(max_cavity + 2, params.arity, params.eta)),
            class_patterns: (0..classes).collect(),
            conditionals: Array3::zeros((classes, params.arity, 2)),
            cavity_sizes: Array2::zeros((classes * params.pop_size, params.arity)),
            max_cavity,
            pass: 0,
            seed,
            params,
        })
    }

    pub fn params(&self) -> &PopulationParams {
        &self.params
    }

    pub fn num_classes(&self) -> usize {
        self.class_patterns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.num_classes() * self.params.pop_size
    }

    pub fn max_cavity(&self) -> usize {
        self.max_cavity
    }

    /// Cavity sizes sampled by the latest derivative pass, one row per replica.
    pub fn cavity_sizes(&self) -> &Array2<usize> {
        &self.cavity_sizes
    }

    pub fn init_joint(&self) -> Array2<f64> {
        replicated_product_joint(self.num_rows(), self.params.arity, self.params.p0)
    }
}

impl MasterEquation for PopulationDynamics {
    fn energy(&self, joint: ArrayView2<f64>) -> f64 {
        let averaged = average_replicas(joint, self.params.pop_size);
        population_energy(averaged.view(), self.params.alpha)
    }

    fn derivative(&mut self, joint: ArrayView2<f64>, mut out: ArrayViewMut2<f64>) -> Result<()> {
        if joint.dim() != (self.num_rows(), self.num_classes()) {
            return Err(anyhow!(
                "Invalid joint shape. Expected: {:?}, Actual: {:?}",
                (self.num_rows(), self.num_classes()),
                joint.dim()
            ));
        }
        let averaged = average_replicas(joint, self.params.pop_size);
        compute_conditionals(averaged.view(), &self.class_patterns, &mut self.conditionals);
        let unsat = mean_unsat(averaged.view());
        self.rates.prepare(&PassSummary {
            energy_density: self.params.alpha * unsat,
            unsat_fraction: unsat,
        });
        self.pass += 1;

        let pass = self.pass;
        let seed = &self.seed;
        let rates = &self.rates;
        let conditionals = &self.conditionals;
        let arity = self.params.arity;
        let pop_size = self.params.pop_size;
        let classes = self.class_patterns.len();
        let mean = self.params.alpha * arity as f64;
        let max_cavity = self.max_cavity;
        Zip::indexed(out.rows_mut())
            .and(joint.rows())
            .and(self.cavity_sizes.rows_mut())
            .par_for_each(|row, mut out_row, p, mut sizes| {
                out_row.fill(0.0);
                let class = row / pop_size;
                let mut rng = SmallRng::from_seed(
                    StdRng::from_seed(derive_seed(seed, &[pass, row as u64])).gen(),
                );
                let mut counts = CavityCounts::new();
                for w in 0..arity {
                    let gamma = poisson_sample(&mut rng, mean).min(max_cavity);
                    sizes[w] = gamma;
                    counts.clear();
                    for _ in 0..gamma {
                        let c = rng.gen_range(0..classes);
                        let w2 = rng.gen_range(0..arity);
                        counts.push(
                            (c >> w2) & 1,
                            [conditionals[[c, w2, 0]], conditionals[[c, w2, 1]]],
                        );
                    }
                    counts.convolve();
                    let totals = flip_totals(&counts, (class >> w) & 1, rates, gamma + 1);
                    accumulate(p, out_row.view_mut(), w, class, &totals);
                }
            });
        Ok(())
    }
}
