//! Apparent-level correction (Earth curvature minus atmospheric refraction).
//!
//! For a sight of horizontal length `D` the line of sight departs from the
//! level surface by
//!
//! ```text
//! n.a = (1 - k) * D^2 / (2 * Rn)
//! ```
//!
//! where `k` is the refraction coefficient and `Rn` the mean Earth radius.
//! The correction is added to the raw height difference.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::atmosphere::refraction::{EmpiricalRefraction, RefractionModel};
use crate::domain::{AtmosphericConditions, AtmosphericCorrection, LevelingConfig};
use crate::error::{LevelingError, Result};
use crate::math::{mean, population_std};

/// Mean Earth radius (m).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Stateless corrector over a refraction policy.
#[derive(Debug, Clone)]
pub struct AtmosphericCorrector {
    refraction: Arc<dyn RefractionModel>,
}

impl Default for AtmosphericCorrector {
    fn default() -> Self {
        Self::new(EmpiricalRefraction::default())
    }
}

impl AtmosphericCorrector {
    pub fn new(refraction: impl RefractionModel + 'static) -> Self {
        Self {
            refraction: Arc::new(refraction),
        }
    }

    pub fn refraction_coefficient(&self, conditions: &AtmosphericConditions) -> f64 {
        self.refraction.coefficient(conditions)
    }

    /// `n.a` in meters for a given distance and coefficient.
    pub fn apparent_level_m(&self, distance_m: f64, refraction_coefficient: f64) -> f64 {
        (1.0 - refraction_coefficient) * distance_m * distance_m / (2.0 * EARTH_RADIUS_M)
    }

    /// Correction for one sight.
    ///
    /// Zero distance yields the identity correction; a negative or non-finite
    /// distance is rejected.
    pub fn correct(
        &self,
        distance_m: f64,
        raw_delta_h_m: f64,
        conditions: &AtmosphericConditions,
    ) -> Result<AtmosphericCorrection> {
        if !(distance_m.is_finite() && distance_m >= 0.0) {
            return Err(LevelingError::InvalidDistance {
                index: 0,
                distance_m,
                context: "atmospheric correction needs a distance >= 0",
            });
        }

        let k = self.refraction_coefficient(conditions);
        if distance_m == 0.0 {
            return Ok(AtmosphericCorrection::zero(distance_m, raw_delta_h_m, k));
        }

        let na_m = self.apparent_level_m(distance_m, k);
        let na_mm = na_m * 1000.0;
        Ok(AtmosphericCorrection {
            distance_m,
            raw_delta_h_m,
            refraction_coefficient: k,
            apparent_level_correction_mm: na_mm,
            total_correction_mm: na_mm,
            corrected_delta_h_m: raw_delta_h_m + na_m,
        })
    }
}

/// Capability injected into the reduction engine: either correct a sight or
/// leave it untouched. The engine never branches on whether correction is on.
pub trait CorrectionStrategy: std::fmt::Debug + Send + Sync {
    fn correct(&self, distance_m: f64, raw_delta_h_m: f64) -> Result<AtmosphericCorrection>;

    /// Whether corrections from this strategy should be reported on the output.
    fn is_active(&self) -> bool;
}

/// Correction disabled: always the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCorrection;

impl CorrectionStrategy for NoCorrection {
    fn correct(&self, distance_m: f64, raw_delta_h_m: f64) -> Result<AtmosphericCorrection> {
        Ok(AtmosphericCorrection::zero(distance_m, raw_delta_h_m, 0.0))
    }

    fn is_active(&self) -> bool {
        false
    }
}

/// Correction enabled: one set of conditions for the whole run.
#[derive(Debug, Clone)]
pub struct ApparentLevelCorrection {
    pub corrector: AtmosphericCorrector,
    pub conditions: AtmosphericConditions,
}

impl ApparentLevelCorrection {
    pub fn new(corrector: AtmosphericCorrector, conditions: AtmosphericConditions) -> Self {
        Self { corrector, conditions }
    }
}

impl CorrectionStrategy for ApparentLevelCorrection {
    fn correct(&self, distance_m: f64, raw_delta_h_m: f64) -> Result<AtmosphericCorrection> {
        self.corrector.correct(distance_m, raw_delta_h_m, &self.conditions)
    }

    fn is_active(&self) -> bool {
        true
    }
}

/// Strategy matching the configuration flag, with the default corrector.
pub fn strategy_for(config: &LevelingConfig) -> Arc<dyn CorrectionStrategy> {
    if config.atmospheric_correction {
        Arc::new(ApparentLevelCorrection::new(
            AtmosphericCorrector::default(),
            config.conditions.clone(),
        ))
    } else {
        Arc::new(NoCorrection)
    }
}

/// How much a correction matters at leveling precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionSignificance {
    Negligible,
    Low,
    Moderate,
    Significant,
}

impl CorrectionSignificance {
    pub fn classify(correction_mm: f64) -> Self {
        let c = correction_mm.abs();
        if c < 0.1 {
            CorrectionSignificance::Negligible
        } else if c < 1.0 {
            CorrectionSignificance::Low
        } else if c < 5.0 {
            CorrectionSignificance::Moderate
        } else {
            CorrectionSignificance::Significant
        }
    }
}

/// Aggregate of the corrections applied over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSummary {
    pub count: usize,
    pub min_distance_m: f64,
    pub max_distance_m: f64,
    pub min_mm: f64,
    pub max_mm: f64,
    pub mean_mm: f64,
    pub total_mm: f64,
    pub std_mm: f64,
    pub rms_mm: f64,
}

pub fn summarize_corrections(corrections: &[AtmosphericCorrection]) -> Option<CorrectionSummary> {
    if corrections.is_empty() {
        return None;
    }
    let values: Vec<f64> = corrections.iter().map(|c| c.total_correction_mm).collect();
    let distances: Vec<f64> = corrections.iter().map(|c| c.distance_m).collect();
    let squares: Vec<f64> = values.iter().map(|v| v * v).collect();

    Some(CorrectionSummary {
        count: values.len(),
        min_distance_m: distances.iter().copied().fold(f64::INFINITY, f64::min),
        max_distance_m: distances.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        min_mm: values.iter().copied().fold(f64::INFINITY, f64::min),
        max_mm: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean_mm: mean(&values),
        total_mm: values.iter().sum(),
        std_mm: population_std(&values),
        rms_mm: mean(&squares).sqrt(),
    })
}
