//! Synthetic data for tests and demonstrations.

pub mod sample;

pub use sample::{simulate_traverse, SimulatedTraverse, TraverseSimulation};
