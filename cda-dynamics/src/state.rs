use cda_instances::FactorGraph;
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// Probability of bit 0 at `position` for a `2^K` joint state.
fn bit_weight(state: usize, position: usize, pi: f64) -> f64 {
    if (state >> position) & 1 == 0 {
        pi
    } else {
        1.0 - pi
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        (numerator / denominator).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Factorised joint distributions, one row per factor node, where `pi[v]` is the
/// probability that variable `v` is true (bit 0).
pub fn product_joint(graph: &FactorGraph, pi: &[f64]) -> Array2<f64> {
    let num_states = graph.num_states();
    let mut joint = Array2::zeros((graph.num_factors(), num_states));
    for (factor, mut row) in graph.factors().iter().zip(joint.rows_mut()) {
        for (state, p) in row.iter_mut().enumerate() {
            *p = factor
                .variables
                .iter()
                .enumerate()
                .map(|(w, &var)| bit_weight(state, w, pi[var]))
                .product();
        }
    }
    joint
}

pub fn uniform_product_joint(graph: &FactorGraph, p0: f64) -> Array2<f64> {
    product_joint(graph, &vec![p0; graph.num_variables()])
}

/// `rows` copies of the factorised distribution over `arity` bits that are each 0
/// with probability `p0`.
pub fn replicated_product_joint(rows: usize, arity: usize, p0: f64) -> Array2<f64> {
    Array2::from_shape_fn((rows, 1 << arity), |(_, state)| {
        (0..arity).map(|w| bit_weight(state, w, p0)).product()
    })
}

/// Fills `out[[row, w, s]]` with the probability that every other position of
/// `row` sits at its violating value, given that position `w` has bit `s`.
///
/// `unsat_patterns[row]` is the violating state of the row. A marginal that is
/// exactly zero yields a conditional of zero.
pub fn compute_conditionals(joint: ArrayView2<f64>, unsat_patterns: &[usize], out: &mut Array3<f64>) {
    let num_states = joint.ncols();
    let arity = num_states.trailing_zeros() as usize;
    for ((row, p), mut cond) in joint
        .rows()
        .into_iter()
        .enumerate()
        .zip(out.axis_iter_mut(Axis(0)))
    {
        let u = unsat_patterns[row];
        for w in 0..arity {
            let mut marginal = [0.0f64; 2];
            for (state, &value) in p.iter().enumerate() {
                marginal[(state >> w) & 1] += value;
            }
            let b = (u >> w) & 1;
            cond[[w, b]] = ratio(p[u], marginal[b]);
            cond[[w, 1 - b]] = ratio(p[u ^ (1 << w)], marginal[1 - b]);
        }
    }
}

/// Probability that each variable is true, averaged over its incident factor
/// nodes. Isolated variables get 0.5.
pub fn variable_marginals(graph: &FactorGraph, joint: ArrayView2<f64>) -> Vec<f64> {
    graph
        .variables()
        .iter()
        .map(|variable| {
            if variable.factors.is_empty() {
                return 0.5;
            }
            let total: f64 = variable
                .factors
                .iter()
                .map(|inc| {
                    joint
                        .row(inc.factor)
                        .iter()
                        .enumerate()
                        .filter(|(state, _)| (state >> inc.position) & 1 == 0)
                        .map(|(_, &p)| p)
                        .sum::<f64>()
                })
                .sum();
            total / variable.degree() as f64
        })
        .collect()
}

/// Mean over the `pop_size` replicas of every class. Row `class * pop_size + r`
/// holds replica `r` of `class`.
pub fn average_replicas(joint: ArrayView2<f64>, pop_size: usize) -> Array2<f64> {
    let classes = joint.nrows() / pop_size;
    let mut averaged = Array2::zeros((classes, joint.ncols()));
    for (class, mut row) in averaged.rows_mut().into_iter().enumerate() {
        let block = joint.slice(ndarray::s![class * pop_size..(class + 1) * pop_size, ..]);
        if let Some(mean) = block.mean_axis(Axis(0)) {
            row.assign(&mean);
        }
    }
    averaged
}

/// Expected number of violated factor nodes.
pub fn graph_energy(graph: &FactorGraph, joint: ArrayView2<f64>) -> f64 {
    graph
        .factors()
        .iter()
        .zip(joint.rows())
        .map(|(factor, row)| row[factor.unsat_combination])
        .sum()
}

/// `alpha` times the mean probability of the violating state over classes, for
/// replica averages whose row `c` is violated by state `c`.
pub fn population_energy(averaged: ArrayView2<f64>, alpha: f64) -> f64 {
    alpha * mean_unsat(averaged)
}

pub fn mean_unsat(averaged: ArrayView2<f64>) -> f64 {
    let classes = averaged.nrows();
    if classes == 0 {
        return 0.0;
    }
    (0..classes).map(|c| averaged[[c, c]]).sum::<f64>() / classes as f64
}
