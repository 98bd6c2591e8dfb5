use crate::{
    derivative::{accumulate, flip_totals, CavityCounts, MasterEquation},
    rates::{PassSummary, RateModel},
    state::{compute_conditionals, graph_energy},
};
use anyhow::{anyhow, Result};
use cda_instances::FactorGraph;
use ndarray::{Array3, ArrayView2, ArrayViewMut2, Zip};

/// Master equation of a local search heuristic on an explicit factor graph.
pub struct GraphDynamics<R> {
    graph: FactorGraph,
    rates: R,
    unsat_patterns: Vec<usize>,
    conditionals: Array3<f64>,
}

impl<R: RateModel> GraphDynamics<R> {
    pub fn new(graph: FactorGraph, rates: R) -> Self {
        let unsat_patterns = graph
            .factors()
            .iter()
            .map(|f| f.unsat_combination)
            .collect();
        let conditionals = Array3::zeros((graph.num_factors(), graph.arity(), 2));
        Self {
            graph,
            rates,
            unsat_patterns,
            conditionals,
        }
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut FactorGraph {
        &mut self.graph
    }

    /// Expected number of violated factor nodes.
    pub fn total_energy(&self, joint: ArrayView2<f64>) -> f64 {
        graph_energy(&self.graph, joint)
    }
}

impl<R: RateModel> MasterEquation for GraphDynamics<R> {
    fn energy(&self, joint: ArrayView2<f64>) -> f64 {
        let n = self.graph.num_variables();
        if n == 0 {
            return 0.0;
        }
        self.total_energy(joint) / n as f64
    }

    fn derivative(&mut self, joint: ArrayView2<f64>, mut out: ArrayViewMut2<f64>) -> Result<()> {
        if joint.dim() != (self.graph.num_factors(), self.graph.num_states()) {
            return Err(anyhow!(
                "Invalid joint shape. Expected: {:?}, Actual: {:?}",
                (self.graph.num_factors(), self.graph.num_states()),
                joint.dim()
            ));
        }
        compute_conditionals(joint, &self.unsat_patterns, &mut self.conditionals);
        let total = self.total_energy(joint);
        let summary = PassSummary {
            energy_density: total / self.graph.num_variables().max(1) as f64,
            unsat_fraction: total / self.graph.num_factors().max(1) as f64,
        };
        self.rates.prepare(&summary);

        let graph = &self.graph;
        let rates = &self.rates;
        let conditionals = &self.conditionals;
        Zip::indexed(out.rows_mut())
            .and(joint.rows())
            .par_for_each(|a, mut out_row, row| {
                out_row.fill(0.0);
                let factor = graph.factor(a);
                let mut counts = CavityCounts::new();
                for &w in factor.free_positions.iter() {
                    let variable = graph.variable(factor.variables[w]);
                    let cavity = &variable.cavities[factor.slots[w]];
                    counts.clear();
                    for group in 0..2 {
                        for &idx in cavity.group(group) {
                            let inc = variable.factors[idx];
                            counts.push(
                                group,
                                [
                                    conditionals[[inc.factor, inc.position, 0]],
                                    conditionals[[inc.factor, inc.position, 1]],
                                ],
                            );
                        }
                    }
                    counts.convolve();
                    let totals = flip_totals(&counts, factor.unsat_bit(w), rates, variable.degree());
                    accumulate(row, out_row.view_mut(), w, factor.unsat_combination, &totals);
                }
            });
        Ok(())
    }
}
