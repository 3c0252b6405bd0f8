//! Shared domain types.
//!
//! These types are intentionally plain data so they can be:
//!
//! - built by an ingestion layer from whatever tabular source it reads
//! - passed explicitly between the reduction and compensation stages
//! - serialized by downstream consumers (reports, plots, project files)
//!
//! Heights and distances are in meters unless the field name says `_mm` or
//! `_km`.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{LevelingError, Result};

// ---------------------------------------------------------------------------
// Input table
// ---------------------------------------------------------------------------

/// One instrument's column group (AR / AV / sight distance) on a table row.
///
/// Values are `None` when the source cell was empty or unparseable; the
/// reduction engine turns those into invalid observations rather than errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingSet {
    pub backsight: Option<f64>,
    pub foresight: Option<f64>,
    pub distance_m: Option<f64>,
}

impl ReadingSet {
    pub fn new(backsight: Option<f64>, foresight: Option<f64>, distance_m: Option<f64>) -> Self {
        Self {
            backsight,
            foresight,
            distance_m,
        }
    }
}

/// One row of the leveling table: a point and its per-instrument readings.
///
/// The foresight on row `k` and the backsight on row `k - 1` belong to the
/// same station (the one between the two points).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRow {
    pub point_id: String,
    pub readings: Vec<ReadingSet>,
}

impl PointRow {
    pub fn new(point_id: impl Into<String>, readings: Vec<ReadingSet>) -> Self {
        Self {
            point_id: point_id.into(),
            readings,
        }
    }

    /// Row with a single instrument column group.
    pub fn single(
        point_id: impl Into<String>,
        backsight: Option<f64>,
        foresight: Option<f64>,
        distance_m: Option<f64>,
    ) -> Self {
        Self::new(point_id, vec![ReadingSet::new(backsight, foresight, distance_m)])
    }
}

/// A full traverse as delivered by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traverse {
    pub rows: Vec<PointRow>,
    pub initial_altitude_m: f64,
    pub known_final_altitude_m: Option<f64>,
}

impl Traverse {
    pub fn new(initial_altitude_m: f64) -> Self {
        Self {
            rows: Vec::new(),
            initial_altitude_m,
            known_final_altitude_m: None,
        }
    }

    pub fn with_known_final(mut self, altitude_m: f64) -> Self {
        self.known_final_altitude_m = Some(altitude_m);
        self
    }

    pub fn with_row(mut self, row: PointRow) -> Self {
        self.rows.push(row);
        self
    }

    /// Number of instrument column groups (the widest row wins).
    pub fn instrument_count(&self) -> usize {
        self.rows.iter().map(|r| r.readings.len()).max().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Reduction output
// ---------------------------------------------------------------------------

/// Why an observation was excluded from accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingValidity {
    Valid,
    MissingBacksight,
    MissingForesight,
    NonFiniteReading,
    /// Negative or non-finite sight distance.
    NegativeDistance,
}

impl ReadingValidity {
    pub fn is_valid(self) -> bool {
        self == ReadingValidity::Valid
    }
}

/// One instrument reading pair between two consecutive points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Index of the segment (row `segment` to row `segment + 1`).
    pub segment: usize,
    /// Zero-based instrument column group.
    pub instrument: usize,
    pub from_point: String,
    pub to_point: String,
    pub backsight: Option<f64>,
    pub foresight: Option<f64>,
    pub distance_m: Option<f64>,
    pub validity: ReadingValidity,
    /// Set by the reduction engine when the correction strategy produced one.
    pub atmospheric_correction: Option<AtmosphericCorrection>,
}

impl Observation {
    /// Raw height difference `AR - AV`, if both readings are present.
    pub fn raw_delta_m(&self) -> Option<f64> {
        match (self.backsight, self.foresight) {
            (Some(ar), Some(av)) => Some(ar - av),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validity.is_valid()
    }
}

/// Processed height difference for one segment (mean over valid instruments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightDifference {
    pub segment: usize,
    pub from_point: String,
    pub to_point: String,
    pub raw_delta_m: f64,
    /// Mean atmospheric correction applied, when correction is enabled.
    pub atmospheric_correction_mm: Option<f64>,
    /// Raw delta plus the atmospheric correction (equal to raw when disabled).
    pub corrected_delta_m: f64,
    /// Mean sight distance of the valid instruments, if all of them had one.
    pub distance_m: Option<f64>,
    /// Number of valid instrument readings averaged into this segment.
    pub instrument_count: usize,
    pub is_valid: bool,
}

/// One point of the traverse with its preliminary altitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeCalculation {
    pub point_id: String,
    pub altitude_m: f64,
    pub cumulative_delta_h_m: f64,
    pub is_reference: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraverseType {
    /// Distinct start and end, no known final altitude.
    Open,
    /// Loop back to the start point, or ending on a known altitude.
    Closed,
}

/// Traverse closure summary.
///
/// `closure_error_mm` is `computed_final - known_final`; it is `None` for an
/// open traverse, where there is nothing to close against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureAnalysis {
    pub traverse_type: TraverseType,
    pub closure_error_mm: Option<f64>,
    pub tolerance_mm: f64,
    pub is_acceptable: bool,
    pub total_distance_km: f64,
    pub error_per_km_mm: Option<f64>,
    /// `|closure_error| / tolerance`.
    pub precision_ratio: Option<f64>,
}

/// Residual summary for the unadjusted chain.
///
/// Each residual is the share of the closure error attributed to one valid
/// height difference in proportion to its sight distance, i.e. the deviation
/// of the observed delta from its closure-adjusted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlStatistics {
    pub residuals_mm: Vec<f64>,
    pub mean_residual_mm: f64,
    pub max_abs_residual_mm: f64,
    pub std_residual_mm: f64,
    pub tolerance_mm: f64,
    pub within_tolerance: usize,
    pub outside_tolerance: usize,
}

/// Agreement between instruments on one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentControl {
    pub segment: usize,
    pub to_point: String,
    pub deltas_mm: Vec<f64>,
    pub mean_mm: f64,
    pub residuals_mm: Vec<f64>,
    pub spread_mm: f64,
    pub tolerance_mm: f64,
    pub is_acceptable: bool,
}

/// Non-fatal data quality findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityWarning {
    ShortSight { segment: usize, instrument: usize, distance_m: f64 },
    LongSight { segment: usize, instrument: usize, distance_m: f64 },
    ReadingOutOfRange { segment: usize, instrument: usize, reading: f64 },
    LargeHeightDifference { segment: usize, delta_m: f64 },
    LongTraverse { total_distance_km: f64 },
    /// The chain of valid height differences stops short of the table's
    /// last row, so a known final altitude cannot be checked against it.
    FinalPointNotReached { last_point: String, final_point: String },
}

/// Everything the reduction engine produces for one traverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResults {
    pub observations: Vec<Observation>,
    pub height_differences: Vec<HeightDifference>,
    pub altitudes: Vec<AltitudeCalculation>,
    pub closure: ClosureAnalysis,
    pub control: ControlStatistics,
    pub instrument_control: Vec<InstrumentControl>,
    pub warnings: Vec<QualityWarning>,
    pub initial_altitude_m: f64,
    pub known_final_altitude_m: Option<f64>,
    pub precision_mm: f64,
    pub atmospheric_correction_applied: bool,
}

impl CalculationResults {
    pub fn valid_height_differences(&self) -> impl Iterator<Item = &HeightDifference> {
        self.height_differences.iter().filter(|hd| hd.is_valid)
    }

    pub fn valid_count(&self) -> usize {
        self.valid_height_differences().count()
    }

    /// Sight distance of each valid height difference, in traverse order.
    ///
    /// This is the distance vector the compensator expects. A valid segment
    /// without a usable distance is reported rather than defaulted.
    pub fn observation_distances(&self) -> Result<Vec<f64>> {
        self.valid_height_differences()
            .enumerate()
            .map(|(index, hd)| match hd.distance_m {
                Some(d) if d.is_finite() && d > 0.0 => Ok(d),
                Some(d) => Err(LevelingError::InvalidDistance {
                    index,
                    distance_m: d,
                    context: "segment sight distance must be positive",
                }),
                None => Err(LevelingError::InvalidDistance {
                    index,
                    distance_m: f64::NAN,
                    context: "segment has no sight distance",
                }),
            })
            .collect()
    }

    /// Id of the table's last row, the point a known final altitude refers to.
    pub fn final_point_id(&self) -> Option<&str> {
        self.height_differences.last().map(|hd| hd.to_point.as_str())
    }

    /// Whether the altitude chain ends on the table's last row.
    pub fn reaches_final_point(&self) -> bool {
        match (self.altitudes.last(), self.final_point_id()) {
            (Some(last), Some(id)) => last.point_id == id,
            _ => false,
        }
    }

    pub fn final_altitude_m(&self) -> f64 {
        self.altitudes
            .last()
            .map(|a| a.altitude_m)
            .unwrap_or(self.initial_altitude_m)
    }
}

// ---------------------------------------------------------------------------
// Atmosphere
// ---------------------------------------------------------------------------

/// Weather at the time of observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericConditions {
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub humidity_percent: f64,
    /// Local time of the readings, when known (drives the thermal-gradient term).
    pub observed_at: Option<NaiveTime>,
    /// Free-form description ("normal", "temperate", "tropical_dry", ...).
    pub condition: String,
}

impl AtmosphericConditions {
    /// 15 °C, 1013.25 hPa, 60 % humidity.
    pub fn standard() -> Self {
        Self {
            temperature_c: 15.0,
            pressure_hpa: 1013.25,
            humidity_percent: 60.0,
            observed_at: None,
            condition: "normal".to_string(),
        }
    }

    pub fn temperate() -> Self {
        Self {
            humidity_percent: 65.0,
            condition: "temperate".to_string(),
            ..Self::standard()
        }
    }

    pub fn tropical_dry() -> Self {
        Self {
            temperature_c: 28.0,
            pressure_hpa: 1010.0,
            humidity_percent: 45.0,
            observed_at: None,
            condition: "tropical_dry".to_string(),
        }
    }

    pub fn at(mut self, time: NaiveTime) -> Self {
        self.observed_at = Some(time);
        self
    }
}

impl Default for AtmosphericConditions {
    fn default() -> Self {
        Self::standard()
    }
}

/// Apparent-level correction computed for one `(distance, delta)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericCorrection {
    pub distance_m: f64,
    pub raw_delta_h_m: f64,
    pub refraction_coefficient: f64,
    /// `n.a = (1 - k) * D^2 / (2 * Rn)`, in millimeters.
    pub apparent_level_correction_mm: f64,
    pub total_correction_mm: f64,
    pub corrected_delta_h_m: f64,
}

impl AtmosphericCorrection {
    /// The identity correction (correction disabled, or zero distance).
    pub fn zero(distance_m: f64, raw_delta_h_m: f64, refraction_coefficient: f64) -> Self {
        Self {
            distance_m,
            raw_delta_h_m,
            refraction_coefficient,
            apparent_level_correction_mm: 0.0,
            total_correction_mm: 0.0,
            corrected_delta_h_m: raw_delta_h_m,
        }
    }
}

// ---------------------------------------------------------------------------
// Compensation output
// ---------------------------------------------------------------------------

/// Outcome of the chi-square test on the variance of unit weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChiSquareTest {
    /// Zero redundancy: nothing to test.
    NotApplicable,
    Evaluated {
        statistic: f64,
        lower: f64,
        upper: f64,
        confidence: f64,
        passed: bool,
    },
}

impl ChiSquareTest {
    /// `Some(passed)` when evaluated, `None` when not applicable.
    pub fn passed(&self) -> Option<bool> {
        match self {
            ChiSquareTest::NotApplicable => None,
            ChiSquareTest::Evaluated { passed, .. } => Some(*passed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationStatistics {
    pub observation_count: usize,
    pub unknown_count: usize,
    pub degrees_of_freedom: usize,
    /// `v^T W v` with residuals in millimeters.
    pub weighted_residual_sum: f64,
    /// Estimated standard deviation of unit weight; `None` when `r = 0`.
    pub sigma0_hat: Option<f64>,
    pub chi_square: ChiSquareTest,
    /// Mirrors `chi_square.passed()`: `None` means "not applicable".
    pub unit_weight_valid: Option<bool>,
    /// Ratio of extreme eigenvalues of the normal matrix.
    pub condition_number: f64,
    pub max_normalized_residual: Option<f64>,
    pub blunder_threshold: Option<f64>,
}

/// Adjusted altitude of one traverse point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedPoint {
    pub point_id: String,
    pub preliminary_altitude_m: f64,
    pub adjusted_altitude_m: f64,
    pub correction_m: f64,
    /// Posterior standard deviation; `None` for held points.
    pub std_dev_mm: Option<f64>,
    pub is_fixed: bool,
}

/// An observation whose normalized residual exceeds the blunder threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspectObservation {
    pub index: usize,
    pub from_point: String,
    pub to_point: String,
    pub residual_mm: f64,
    pub normalized_residual: f64,
}

/// Advisory check of the largest correction against the target precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecisionCheck {
    pub max_correction_mm: f64,
    pub target_mm: f64,
    pub within_target: bool,
}

/// Shape of the unknown corrections along the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionPattern {
    /// Corrections trend linearly with position (|r| > 0.8), typical of a
    /// reference altitude or rod scale error.
    Systematic,
    Random,
}

/// Overall verdict on an adjustment.
///
/// `final_precision_mm` is `max(sigma0, max posterior std dev)`, with the
/// prior sigma0 standing in when there is no redundancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationQuality {
    pub final_precision_mm: f64,
    pub target_mm: f64,
    pub precision_achieved: bool,
    /// Largest `|w_i|` above 3.
    pub high_normalized_residual: bool,
    pub correction_pattern: CorrectionPattern,
    pub suspect_count: usize,
    /// Precision achieved, chi-square not failed, no suspect observation.
    pub is_acceptable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationResults {
    /// One entry per altitude of the input chain, in the same order.
    pub adjusted_altitudes: Vec<AdjustedPoint>,
    /// Ids of the unknowns, matching `corrections_m`.
    pub unknown_ids: Vec<String>,
    pub corrections_m: Vec<f64>,
    /// `v = A x - b`, one per valid observation.
    pub residuals_mm: Vec<f64>,
    pub normalized_residuals: Vec<f64>,
    pub suspects: Vec<SuspectObservation>,
    pub statistics: CompensationStatistics,
    pub precision_check: PrecisionCheck,
    pub quality: CompensationQuality,
}

impl CompensationResults {
    pub fn adjusted_altitude(&self, point_id: &str) -> Option<f64> {
        self.adjusted_altitudes
            .iter()
            .find(|p| p.point_id == point_id)
            .map(|p| p.adjusted_altitude_m)
    }
}
