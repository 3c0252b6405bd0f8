//! `leveling-adjust` library crate.
//!
//! Differential-leveling reduction and network adjustment:
//!
//! - `reduction` turns backsight/foresight readings into height differences,
//!   altitudes and a closure analysis
//! - `atmosphere` provides the apparent-level (curvature and refraction)
//!   correction the reduction can apply per sight
//! - `compensation` adjusts the reduced chain by weighted least squares and
//!   certifies it with a chi-square test
//!
//! Every stage takes its inputs and configuration explicitly and keeps no
//! state between calls.

pub mod atmosphere;
pub mod compensation;
pub mod data;
pub mod domain;
pub mod error;
pub mod math;
pub mod pipeline;
pub mod reduction;

pub use compensation::{compensate, NetworkCompensator};
pub use domain::{CalculationResults, CompensationConfig, CompensationResults, LevelingConfig, Traverse};
pub use error::{LevelingError, Result};
pub use pipeline::{run, LevelingRun};
pub use reduction::{reduce, ReductionEngine};
