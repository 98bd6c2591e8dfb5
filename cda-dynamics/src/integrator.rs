use crate::derivative::MasterEquation;
use anyhow::{anyhow, Result};
use log::{debug, trace};
use logging_timer::time;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

const STEP_UNDERFLOW: f64 = 1e-300;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IntegratorConfig {
    pub tolerance: f64,
    pub initial_step: f64,
    pub min_step: f64,
    pub max_step: Option<f64>,
    /// Integration stops once the energy falls below this value.
    pub stop_energy: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-2,
            initial_step: 1e-2,
            min_step: 1e-7,
            max_step: None,
            stop_energy: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    StageOne,
    StageTwo,
    Accept,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    Rejected,
    /// The corrected state had a negative entry; the step was halved.
    Infeasible,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct RunSummary {
    pub time: f64,
    pub energy: f64,
    pub accepted: usize,
    pub rejected: usize,
    pub infeasible: usize,
}

/// Adaptive Heun integrator whose steps never produce negative probabilities.
#[derive(Debug, Clone)]
pub struct Heun {
    config: IntegratorConfig,
    dt: f64,
    dt_min: f64,
    time: f64,
    stage: Stage,
    accepted: usize,
    rejected: usize,
    infeasible: usize,
    f0: Array2<f64>,
    f1: Array2<f64>,
    trial: Array2<f64>,
}

impl Heun {
    pub fn new(config: IntegratorConfig) -> Self {
        Self {
            dt: config.initial_step,
            dt_min: config.min_step,
            time: 0.0,
            stage: Stage::StageOne,
            accepted: 0,
            rejected: 0,
            infeasible: 0,
            f0: Array2::zeros((0, 0)),
            f1: Array2::zeros((0, 0)),
            trial: Array2::zeros((0, 0)),
            config,
        }
    }

    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_size(&self) -> f64 {
        self.dt
    }

    pub fn min_step(&self) -> f64 {
        self.dt_min
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn summary(&self, energy: f64) -> RunSummary {
        RunSummary {
            time: self.time,
            energy,
            accepted: self.accepted,
            rejected: self.rejected,
            infeasible: self.infeasible,
        }
    }

    fn ensure_buffers(&mut self, dim: (usize, usize)) {
        if self.f0.dim() != dim {
            self.f0 = Array2::zeros(dim);
            self.f1 = Array2::zeros(dim);
            self.trial = Array2::zeros(dim);
        }
    }

    fn halve(&mut self) -> Result<()> {
        self.dt *= 0.5;
        if self.dt < self.dt_min {
            self.dt_min = self.dt;
        }
        if self.dt < STEP_UNDERFLOW {
            return Err(anyhow!("Step size underflow at t = {}", self.time));
        }
        Ok(())
    }

    fn update_step(&mut self, error: f64) {
        let proposed = if error > 0.0 {
            0.8 * self.dt * (2.0 * self.config.tolerance / error).sqrt()
        } else {
            5.0 * self.dt
        };
        let upper = self.config.max_step.unwrap_or(f64::INFINITY);
        self.dt = proposed.max(self.dt_min).min(upper);
    }

    /// One Heun attempt from `joint`. Time and `joint` only change when the
    /// step is accepted.
    pub fn attempt<S: MasterEquation + ?Sized>(
        &mut self,
        system: &mut S,
        joint: &mut Array2<f64>,
    ) -> Result<StepOutcome> {
        self.ensure_buffers(joint.dim());
        self.stage = Stage::StageOne;
        system.derivative(joint.view(), self.f0.view_mut())?;
        loop {
            let dt = self.dt;
            Zip::from(&mut self.trial)
                .and(&*joint)
                .and(&self.f0)
                .for_each(|t, &p, &f| *t = p + dt * f);
            if self.trial.iter().all(|&p| p >= 0.0) {
                break;
            }
            self.halve()?;
        }

        self.stage = Stage::StageTwo;
        system.derivative(self.trial.view(), self.f1.view_mut())?;
        let dt = self.dt;
        Zip::from(&mut self.trial)
            .and(&*joint)
            .and(&self.f0)
            .and(&self.f1)
            .for_each(|t, &p, &f0, &f1| *t = p + 0.5 * dt * (f0 + f1));
        if self.trial.iter().any(|&p| p < 0.0) {
            self.infeasible += 1;
            self.halve()?;
            trace!("infeasible corrector at t = {}, dt -> {:e}", self.time, self.dt);
            return Ok(StepOutcome::Infeasible);
        }

        let error = dt * (&self.f0 - &self.f1).mapv(f64::abs).mean().unwrap_or(0.0);
        if !error.is_finite() {
            return Err(anyhow!("Non-finite error estimate at t = {}", self.time));
        }
        let outcome = if error < 2.0 * self.config.tolerance {
            self.stage = Stage::Accept;
            joint.assign(&self.trial);
            self.time += dt;
            self.accepted += 1;
            debug!("accepted t = {} dt = {:e} error = {:e}", self.time, dt, error);
            StepOutcome::Accepted
        } else {
            self.stage = Stage::Reject;
            self.rejected += 1;
            trace!("rejected t = {} dt = {:e} error = {:e}", self.time, dt, error);
            StepOutcome::Rejected
        };
        self.update_step(error);
        Ok(outcome)
    }

    /// Repeats attempts until one is accepted.
    pub fn advance<S: MasterEquation + ?Sized>(
        &mut self,
        system: &mut S,
        joint: &mut Array2<f64>,
    ) -> Result<()> {
        while self.attempt(system, joint)? != StepOutcome::Accepted {}
        Ok(())
    }

    /// Integrates until `horizon` or until the energy drops below the stop
    /// threshold, passing `(t, e)` to `record` at the start and after every
    /// accepted step.
    #[time]
    pub fn integrate<S: MasterEquation + ?Sized>(
        &mut self,
        system: &mut S,
        joint: &mut Array2<f64>,
        horizon: f64,
        record: &mut dyn FnMut(f64, f64) -> Result<()>,
    ) -> Result<RunSummary> {
        let mut energy = system.energy(joint.view());
        record(self.time, energy)?;
        while self.time < horizon && energy >= self.config.stop_energy {
            if self.attempt(system, joint)? == StepOutcome::Accepted {
                energy = system.energy(joint.view());
                record(self.time, energy)?;
            }
        }
        let summary = self.summary(energy);
        log::info!(
            "integration finished: t = {}, e = {:e}, {} accepted, {} rejected, {} infeasible",
            summary.time,
            summary.energy,
            summary.accepted,
            summary.rejected,
            summary.infeasible
        );
        Ok(summary)
    }
}
