//! Control statistics for the unadjusted chain and inter-instrument control.

use crate::domain::{ControlStatistics, HeightDifference, InstrumentControl, Observation};
use crate::math::{max_abs, mean, population_std};

/// Distribute the closure error over the valid height differences.
///
/// Residual `i` is `e * d_i / D`: how far observation `i` sits from its
/// closure-adjusted value when the misclosure is spread in proportion to sight
/// distance. Without a complete set of distances the error is shared equally;
/// without a closure error every residual is zero.
pub fn control_statistics(
    height_differences: &[HeightDifference],
    closure_error_mm: Option<f64>,
    tolerance_mm: f64,
) -> ControlStatistics {
    let valid: Vec<&HeightDifference> = height_differences.iter().filter(|hd| hd.is_valid).collect();
    let n = valid.len();

    let residuals_mm: Vec<f64> = match closure_error_mm {
        None => vec![0.0; n],
        Some(e) => {
            let distances: Option<Vec<f64>> = valid
                .iter()
                .map(|hd| hd.distance_m.filter(|d| d.is_finite() && *d > 0.0))
                .collect();
            match distances {
                Some(ds) if ds.iter().sum::<f64>() > 0.0 => {
                    let total: f64 = ds.iter().sum();
                    ds.iter().map(|d| e * d / total).collect()
                }
                _ => vec![e / n.max(1) as f64; n],
            }
        }
    };

    let within = residuals_mm.iter().filter(|r| r.abs() <= tolerance_mm).count();
    ControlStatistics {
        mean_residual_mm: mean(&residuals_mm),
        max_abs_residual_mm: max_abs(&residuals_mm),
        std_residual_mm: population_std(&residuals_mm),
        tolerance_mm,
        within_tolerance: within,
        outside_tolerance: n - within,
        residuals_mm,
    }
}

/// Agreement between instruments on every segment read by at least two.
///
/// `observations` must be grouped by segment, as the reduction engine emits
/// them.
pub fn instrument_control(observations: &[Observation], tolerance_mm: f64) -> Vec<InstrumentControl> {
    observations
        .chunk_by(|a, b| a.segment == b.segment)
        .filter_map(|group| {
            let deltas_mm: Vec<f64> = group
                .iter()
                .filter(|o| o.is_valid())
                .filter_map(corrected_delta_m)
                .map(|d| d * 1000.0)
                .collect();
            if deltas_mm.len() < 2 {
                return None;
            }
            let mean_mm = mean(&deltas_mm);
            let lo = deltas_mm.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = deltas_mm.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let spread_mm = hi - lo;
            Some(InstrumentControl {
                segment: group[0].segment,
                to_point: group[0].to_point.clone(),
                residuals_mm: deltas_mm.iter().map(|d| d - mean_mm).collect(),
                deltas_mm,
                mean_mm,
                spread_mm,
                tolerance_mm,
                is_acceptable: spread_mm <= tolerance_mm,
            })
        })
        .collect()
}

fn corrected_delta_m(obs: &Observation) -> Option<f64> {
    match obs.atmospheric_correction {
        Some(c) => Some(c.corrected_delta_h_m),
        None => obs.raw_delta_m(),
    }
}
