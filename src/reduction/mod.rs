//! Preliminary reduction of a leveling traverse.

pub mod closure;
pub mod control;
pub mod engine;
pub mod quality;

pub use closure::{analyze_closure, ClosureInputs};
pub use control::{control_statistics, instrument_control};
pub use engine::ReductionEngine;

use crate::atmosphere::{summarize_corrections, CorrectionSummary};
use crate::domain::{CalculationResults, LevelingConfig, Traverse};
use crate::error::Result;

/// Reduce `traverse` with the correction strategy implied by `config`.
pub fn reduce(traverse: &Traverse, config: &LevelingConfig) -> Result<CalculationResults> {
    ReductionEngine::new(config.clone())?.reduce(traverse)
}

/// Summary of the atmospheric corrections applied to valid observations.
pub fn correction_summary(results: &CalculationResults) -> Option<CorrectionSummary> {
    let corrections: Vec<_> = results
        .observations
        .iter()
        .filter(|o| o.is_valid())
        .filter_map(|o| o.atmospheric_correction)
        .collect();
    summarize_corrections(&corrections)
}
