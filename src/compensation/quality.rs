//! Overall quality verdict for an adjustment.
//!
//! Combines the pieces the compensator already computes into one answer:
//!
//! - final precision `max(sigma0, max std dev)` against the target precision
//! - chi-square outcome and suspect observations
//! - a 3-sigma flag on the largest normalized residual
//! - whether the corrections trend along the chain (systematic) or not

use tracing::warn;

use crate::domain::{AdjustedPoint, CompensationQuality, CompensationStatistics, CorrectionPattern};
use crate::math::correlation;

/// Normalized residuals above this are flagged even when under the blunder threshold.
pub const NORMALIZED_RESIDUAL_LIMIT: f64 = 3.0;
/// `|r|` between position and correction above which the pattern is systematic.
pub const SYSTEMATIC_CORRELATION: f64 = 0.8;

/// Systematic when the corrections correlate linearly with their position.
/// Fewer than three corrections are always treated as random.
pub fn correction_pattern(corrections: &[f64]) -> CorrectionPattern {
    if corrections.len() < 3 {
        return CorrectionPattern::Random;
    }
    let index: Vec<f64> = (0..corrections.len()).map(|i| i as f64).collect();
    match correlation(&index, corrections) {
        Some(r) if r.abs() > SYSTEMATIC_CORRELATION => CorrectionPattern::Systematic,
        _ => CorrectionPattern::Random,
    }
}

pub fn assess(
    statistics: &CompensationStatistics,
    points: &[AdjustedPoint],
    corrections_mm: &[f64],
    suspect_count: usize,
    prior_sigma0: f64,
    target_mm: f64,
) -> CompensationQuality {
    let sigma0 = statistics.sigma0_hat.unwrap_or(prior_sigma0);
    let max_std_dev = points
        .iter()
        .filter_map(|p| p.std_dev_mm)
        .fold(0.0_f64, f64::max);
    let final_precision_mm = sigma0.max(max_std_dev);
    let precision_achieved = final_precision_mm <= target_mm;
    let high_normalized_residual = statistics
        .max_normalized_residual
        .is_some_and(|w| w > NORMALIZED_RESIDUAL_LIMIT);
    let correction_pattern = correction_pattern(corrections_mm);

    let is_acceptable = precision_achieved && statistics.unit_weight_valid != Some(false) && suspect_count == 0;
    if !is_acceptable {
        warn!(
            final_precision_mm,
            target_mm,
            unit_weight_valid = ?statistics.unit_weight_valid,
            suspect_count,
            "compensation below quality target"
        );
    }
    if high_normalized_residual {
        warn!(max_normalized_residual = ?statistics.max_normalized_residual, "large normalized residual");
    }

    CompensationQuality {
        final_precision_mm,
        target_mm,
        precision_achieved,
        high_normalized_residual,
        correction_pattern,
        suspect_count,
        is_acceptable,
    }
}
