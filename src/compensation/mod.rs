//! Weighted least-squares network compensation.

pub mod batch;
pub mod blunders;
pub mod compensator;
pub mod quality;
pub mod system;

pub use batch::{compensate_batch, CompensationJob};
pub use blunders::BlunderScreen;
pub use compensator::NetworkCompensator;
pub use quality::correction_pattern;
pub use system::{Link, NetworkSystem};

use crate::domain::{CalculationResults, CompensationConfig, CompensationResults};
use crate::error::Result;

/// Compensate `results` with one distance (m) per valid height difference.
pub fn compensate(
    results: &CalculationResults,
    distances: &[f64],
    config: &CompensationConfig,
) -> Result<CompensationResults> {
    NetworkCompensator::new(config.clone())?.compensate(results, distances)
}
