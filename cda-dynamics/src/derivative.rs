use crate::{convolution::Convolver, rates::RateModel};
use anyhow::Result;
use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};

/// Right-hand side of the master equation for a set of joint distributions.
pub trait MasterEquation {
    /// Energy reported alongside simulated time.
    fn energy(&self, joint: ArrayView2<f64>) -> f64;

    /// Writes `dP/dt` for every row of `joint` into `out`.
    fn derivative(&mut self, joint: ArrayView2<f64>, out: ArrayViewMut2<f64>) -> Result<()>;
}

/// The distributions of the number of violated cavity neighbours of one source
/// position, for each violating-bit group and each own bit.
#[derive(Debug, Clone, Default)]
pub struct CavityCounts {
    // indexed [group][own bit]
    pu: [[Vec<f64>; 2]; 2],
    dist: [[Vec<f64>; 2]; 2],
    convolver: Convolver,
}

impl CavityCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        for group in self.pu.iter_mut() {
            for pu in group.iter_mut() {
                pu.clear();
            }
        }
    }

    /// Adds a neighbour violated when the source has bit `group`, with
    /// `cond[s]` its violation probability given source bit `s`.
    pub fn push(&mut self, group: usize, cond: [f64; 2]) {
        self.pu[group][0].push(cond[0]);
        self.pu[group][1].push(cond[1]);
    }

    pub fn convolve(&mut self) {
        for group in 0..2 {
            for own in 0..2 {
                let fe = self.convolver.run(&self.pu[group][own]);
                self.dist[group][own].clear();
                self.dist[group][own].extend_from_slice(fe);
            }
        }
    }

    pub fn dist(&self, group: usize, own: usize) -> &[f64] {
        &self.dist[group][own]
    }
}

fn expected_rate<R: RateModel + ?Sized>(
    rates: &R,
    degree: usize,
    current: &[f64],
    current_offset: usize,
    flipped: &[f64],
    flipped_offset: usize,
) -> f64 {
    let mut total = 0.0;
    for (e_current, &p_current) in current.iter().enumerate() {
        if p_current == 0.0 {
            continue;
        }
        for (e_flipped, &p_flipped) in flipped.iter().enumerate() {
            total += rates.rate(
                e_current + current_offset,
                e_flipped + flipped_offset,
                degree,
            ) * p_current
                * p_flipped;
        }
    }
    total
}

/// Flip rates of the source position averaged over its cavity, as
/// `totals[own bit][involved]` where `involved` is 1 for the two states in which
/// the source's own factor node is, or becomes, violated.
pub fn flip_totals<R: RateModel + ?Sized>(
    counts: &CavityCounts,
    unsat_bit: usize,
    rates: &R,
    degree: usize,
) -> [[f64; 2]; 2] {
    let b = unsat_bit;
    let o = 1 - b;
    let mut totals = [[0.0; 2]; 2];
    // own bit s: violated count from group s, would-be count from group 1 - s
    totals[0][0] = expected_rate(rates, degree, counts.dist(0, 0), 0, counts.dist(1, 0), 0);
    totals[1][0] = expected_rate(rates, degree, counts.dist(1, 1), 0, counts.dist(0, 1), 0);
    totals[b][1] = expected_rate(rates, degree, counts.dist(b, b), 1, counts.dist(o, b), 0);
    totals[o][1] = expected_rate(rates, degree, counts.dist(o, o), 0, counts.dist(b, o), 1);
    totals
}

/// Adds the outflow and inflow through flips of `position` to `out`.
pub fn accumulate(
    joint: ArrayView1<f64>,
    mut out: ArrayViewMut1<f64>,
    position: usize,
    unsat_combination: usize,
    totals: &[[f64; 2]; 2],
) {
    let mask = 1 << position;
    for state in 0..joint.len() {
        let bit = (state >> position) & 1;
        let flipped = state ^ mask;
        let involved = (state == unsat_combination || flipped == unsat_combination) as usize;
        out[state] += totals[1 - bit][involved] * joint[flipped] - totals[bit][involved] * joint[state];
    }
}
