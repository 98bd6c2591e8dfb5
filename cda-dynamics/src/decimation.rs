use crate::{
    graph::GraphDynamics,
    integrator::Heun,
    rates::RateModel,
    state::{product_joint, variable_marginals},
};
use anyhow::{anyhow, Result};
use cda_instances::Assignment;
use log::info;
use logging_timer::time;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DecimationParams {
    /// Accepted integrator steps between two fixings.
    pub steps_per_round: usize,
    /// Initial probability that a variable is true.
    pub p0: f64,
}

impl Default for DecimationParams {
    fn default() -> Self {
        Self {
            steps_per_round: 10,
            p0: 0.5,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub round: usize,
    pub variable: usize,
    pub value: bool,
    pub accepted_steps: usize,
    pub energy: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DecimationReport {
    pub assignment: Assignment,
    pub residual_energy: usize,
    pub accepted_steps: usize,
    pub energy: f64,
}

/// Index of the free variable whose marginal is furthest from 1/2, the lowest
/// index winning ties.
pub fn most_biased(pi: &[f64], fixed: &[Option<bool>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (v, &p) in pi.iter().enumerate() {
        if fixed[v].is_some() {
            continue;
        }
        let bias = (p - 0.5).abs();
        if best.map_or(true, |(_, b)| bias > b) {
            best = Some((v, bias));
        }
    }
    best.map(|(v, _)| v)
}

/// Fixes one variable per round until every variable has a value.
#[time]
pub fn decimate<R: RateModel>(
    dynamics: &mut GraphDynamics<R>,
    integrator: &mut Heun,
    params: &DecimationParams,
    on_round: &mut dyn FnMut(&RoundSummary) -> Result<()>,
) -> Result<DecimationReport> {
    let n = dynamics.graph().num_variables();
    let mut pi = vec![params.p0; n];
    let mut fixed: Vec<Option<bool>> = vec![None; n];
    let mut joint = product_joint(dynamics.graph(), &pi);
    let mut accepted_steps = 0;

    for round in 0..n {
        let mut steps = 0;
        while steps < params.steps_per_round && dynamics.total_energy(joint.view()) > 1.0 {
            integrator.advance(dynamics, &mut joint)?;
            steps += 1;
        }
        accepted_steps += steps;

        let marginals = variable_marginals(dynamics.graph(), joint.view());
        for (v, m) in marginals.into_iter().enumerate() {
            if fixed[v].is_none() {
                pi[v] = m;
            }
        }
        let variable = most_biased(&pi, &fixed)
            .ok_or_else(|| anyhow!("No free variable left in round {}", round))?;
        let value = pi[variable] > 0.5;
        pi[variable] = if value { 1.0 } else { 0.0 };
        fixed[variable] = Some(value);
        dynamics.graph_mut().release_variable(variable);
        joint = product_joint(dynamics.graph(), &pi);

        let summary = RoundSummary {
            round,
            variable,
            value,
            accepted_steps: steps,
            energy: dynamics.total_energy(joint.view()),
        };
        info!(
            "round {}: fixed variable {} to {} after {} steps, energy {}",
            round, variable, value, steps, summary.energy
        );
        on_round(&summary)?;
    }

    let assignment = Assignment {
        variables: fixed.into_iter().map(|v| v.unwrap_or(false)).collect(),
    };
    let residual_energy = dynamics.graph().count_unsatisfied(&assignment.variables)?;
    Ok(DecimationReport {
        assignment,
        residual_energy,
        accepted_steps,
        energy: dynamics.total_energy(joint.view()),
    })
}
