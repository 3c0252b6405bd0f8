//! Plausibility checks on the raw table.
//!
//! None of these stop a run; they are collected on `CalculationResults` and
//! logged at `warn` level.

use tracing::warn;

use crate::domain::{AltitudeCalculation, HeightDifference, Observation, QualityWarning};

pub const MIN_SIGHT_M: f64 = 1.0;
pub const MAX_SIGHT_M: f64 = 300.0;
pub const MAX_READING_M: f64 = 10.0;
pub const MAX_HEIGHT_DIFFERENCE_M: f64 = 50.0;
pub const MAX_TRAVERSE_KM: f64 = 50.0;

pub fn observation_warnings(observations: &[Observation]) -> Vec<QualityWarning> {
    let mut out = Vec::new();
    for obs in observations {
        if let Some(d) = obs.distance_m.filter(|d| d.is_finite() && *d >= 0.0) {
            if d < MIN_SIGHT_M {
                out.push(QualityWarning::ShortSight {
                    segment: obs.segment,
                    instrument: obs.instrument,
                    distance_m: d,
                });
            } else if d > MAX_SIGHT_M {
                out.push(QualityWarning::LongSight {
                    segment: obs.segment,
                    instrument: obs.instrument,
                    distance_m: d,
                });
            }
        }
        for reading in [obs.backsight, obs.foresight].into_iter().flatten() {
            if reading.is_finite() && reading.abs() > MAX_READING_M {
                out.push(QualityWarning::ReadingOutOfRange {
                    segment: obs.segment,
                    instrument: obs.instrument,
                    reading,
                });
            }
        }
    }
    out
}

pub fn segment_warnings(height_differences: &[HeightDifference], total_distance_km: f64) -> Vec<QualityWarning> {
    let mut out: Vec<QualityWarning> = height_differences
        .iter()
        .filter(|hd| hd.is_valid && hd.corrected_delta_m.abs() > MAX_HEIGHT_DIFFERENCE_M)
        .map(|hd| QualityWarning::LargeHeightDifference {
            segment: hd.segment,
            delta_m: hd.corrected_delta_m,
        })
        .collect();
    if total_distance_km > MAX_TRAVERSE_KM {
        out.push(QualityWarning::LongTraverse { total_distance_km });
    }
    out
}

/// Flags a chain that stops before the table's last row.
pub fn chain_warning(altitudes: &[AltitudeCalculation], final_point_id: &str) -> Option<QualityWarning> {
    let last = altitudes.last()?;
    (last.point_id != final_point_id).then(|| QualityWarning::FinalPointNotReached {
        last_point: last.point_id.clone(),
        final_point: final_point_id.to_string(),
    })
}

pub(crate) fn log_warnings(warnings: &[QualityWarning]) {
    for w in warnings {
        warn!(warning = ?w, "quality check");
    }
}
