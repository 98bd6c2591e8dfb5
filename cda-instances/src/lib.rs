pub mod dimacs;
pub mod generate;
pub mod graph;

pub use generate::{Assignment, Instance, InstanceParams};
pub use graph::{Cavity, FactorGraph, FactorNode, Incidence, Variable};
