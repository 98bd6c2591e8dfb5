pub mod convolution;
pub mod decimation;
pub mod derivative;
pub mod graph;
pub mod integrator;
pub mod poisson;
pub mod population;
pub mod rates;
pub mod state;

pub use decimation::{decimate, DecimationParams, DecimationReport, RoundSummary};
pub use derivative::MasterEquation;
pub use graph::GraphDynamics;
pub use integrator::{Heun, IntegratorConfig, RunSummary, Stage, StepOutcome};
pub use population::{PopulationDynamics, PopulationParams};
pub use rates::{FmsRateTable, FmsRates, PassSummary, RateModel, WalkSatRates};
