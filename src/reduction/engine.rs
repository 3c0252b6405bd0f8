//! Reduction engine: raw readings to height differences and altitudes.
//!
//! Pipeline for one traverse:
//!
//! 1. One `Observation` per segment and instrument (`AR` from the row behind,
//!    `AV` and sight distance from the row ahead), validated and optionally
//!    corrected through the injected `CorrectionStrategy`.
//! 2. One `HeightDifference` per segment, averaging its valid instruments.
//! 3. Sequential accumulation of the valid height differences from the
//!    initial altitude.
//! 4. Closure, control statistics, instrument control, quality warnings.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::atmosphere::{strategy_for, CorrectionStrategy};
use crate::domain::{
    AltitudeCalculation, CalculationResults, HeightDifference, LevelingConfig, Observation, PointRow,
    ReadingValidity, Traverse,
};
use crate::error::{LevelingError, Result};
use crate::math::mean;
use crate::reduction::closure::{analyze_closure, ClosureInputs};
use crate::reduction::control::{control_statistics, instrument_control};
use crate::reduction::quality::{chain_warning, log_warnings, observation_warnings, segment_warnings};

#[derive(Debug, Clone)]
pub struct ReductionEngine {
    config: LevelingConfig,
    strategy: Arc<dyn CorrectionStrategy>,
}

impl ReductionEngine {
    /// Engine with the correction strategy implied by `config`.
    pub fn new(config: LevelingConfig) -> Result<Self> {
        let strategy = strategy_for(&config);
        Self::with_strategy(config, strategy)
    }

    /// Engine with an explicit correction strategy (custom refraction model,
    /// per-project calibration, ...). `config.atmospheric_correction` is
    /// ignored in favor of the strategy.
    pub fn with_strategy(config: LevelingConfig, strategy: Arc<dyn CorrectionStrategy>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, strategy })
    }

    pub fn config(&self) -> &LevelingConfig {
        &self.config
    }

    pub fn reduce(&self, traverse: &Traverse) -> Result<CalculationResults> {
        let rows = &traverse.rows;
        if rows.len() < 2 {
            return Err(LevelingError::InsufficientData {
                valid_points: rows.len(),
                observations: 0,
                reason: "a traverse needs at least two points".to_string(),
            });
        }
        if !traverse.initial_altitude_m.is_finite() {
            return Err(LevelingError::config(
                "initial_altitude_m",
                traverse.initial_altitude_m,
                "must be finite",
            ));
        }
        if let Some(known) = traverse.known_final_altitude_m.filter(|k| !k.is_finite()) {
            return Err(LevelingError::config("known_final_altitude_m", known, "must be finite"));
        }
        let final_point_id = &rows[rows.len() - 1].point_id;

        let instruments = traverse.instrument_count();
        let mut observations = Vec::with_capacity((rows.len() - 1) * instruments);
        for (segment, pair) in rows.windows(2).enumerate() {
            for instrument in 0..instruments {
                observations.push(self.observe(segment, instrument, &pair[0], &pair[1])?);
            }
        }

        let height_differences: Vec<HeightDifference> = observations
            .chunk_by(|a, b| a.segment == b.segment)
            .map(|group| self.segment_difference(group))
            .collect();

        let altitudes = accumulate(&rows[0].point_id, traverse.initial_altitude_m, &height_differences);
        let valid = altitudes.len() - 1;
        if valid == 0 {
            return Err(LevelingError::InsufficientData {
                valid_points: 1,
                observations: observations.len(),
                reason: "no valid height difference".to_string(),
            });
        }

        let total_distance_km = height_differences
            .iter()
            .filter(|hd| hd.is_valid)
            .filter_map(|hd| hd.distance_m)
            .sum::<f64>()
            / 1000.0;

        let closure = analyze_closure(
            &altitudes,
            &ClosureInputs {
                initial_altitude_m: traverse.initial_altitude_m,
                known_final_altitude_m: traverse.known_final_altitude_m,
                final_point_id,
                total_distance_km,
                precision_mm: self.config.precision_mm,
                tolerance: self.config.tolerance,
            },
        );
        let control = control_statistics(&height_differences, closure.closure_error_mm, self.config.precision_mm);
        let instrument_control = instrument_control(&observations, self.config.instrument_tolerance_mm);

        let mut warnings = observation_warnings(&observations);
        warnings.extend(segment_warnings(&height_differences, total_distance_km));
        warnings.extend(chain_warning(&altitudes, final_point_id));
        log_warnings(&warnings);

        debug!(
            points = altitudes.len(),
            segments = height_differences.len(),
            valid,
            total_distance_km,
            closure_mm = ?closure.closure_error_mm,
            tolerance_mm = closure.tolerance_mm,
            acceptable = closure.is_acceptable,
            "traverse reduced"
        );

        Ok(CalculationResults {
            observations,
            height_differences,
            altitudes,
            closure,
            control,
            instrument_control,
            warnings,
            initial_altitude_m: traverse.initial_altitude_m,
            known_final_altitude_m: traverse.known_final_altitude_m,
            precision_mm: self.config.precision_mm,
            atmospheric_correction_applied: self.strategy.is_active(),
        })
    }

    fn observe(&self, segment: usize, instrument: usize, behind: &PointRow, ahead: &PointRow) -> Result<Observation> {
        let backsight = behind.readings.get(instrument).and_then(|r| r.backsight);
        let sight = ahead.readings.get(instrument).copied().unwrap_or_default();
        let validity = classify(backsight, sight.foresight, sight.distance_m);

        let atmospheric_correction = match (backsight, sight.foresight) {
            (Some(ar), Some(av)) if validity.is_valid() && self.strategy.is_active() => {
                Some(self.strategy.correct(sight.distance_m.unwrap_or(0.0), ar - av)?)
            }
            _ => None,
        };

        if !validity.is_valid() {
            warn!(
                segment,
                instrument,
                from = %behind.point_id,
                to = %ahead.point_id,
                ?validity,
                "reading excluded from accumulation"
            );
        }

        Ok(Observation {
            segment,
            instrument,
            from_point: behind.point_id.clone(),
            to_point: ahead.point_id.clone(),
            backsight,
            foresight: sight.foresight,
            distance_m: sight.distance_m,
            validity,
            atmospheric_correction,
        })
    }

    fn segment_difference(&self, group: &[Observation]) -> HeightDifference {
        let first = &group[0];
        let valid: Vec<&Observation> = group.iter().filter(|o| o.is_valid()).collect();

        let raw: Vec<f64> = valid.iter().filter_map(|o| o.raw_delta_m()).collect();
        let corrected: Vec<f64> = valid
            .iter()
            .filter_map(|o| match o.atmospheric_correction {
                Some(c) => Some(c.corrected_delta_h_m),
                None => o.raw_delta_m(),
            })
            .collect();
        let correction_mm = self.strategy.is_active().then(|| {
            let mm: Vec<f64> = valid
                .iter()
                .filter_map(|o| o.atmospheric_correction)
                .map(|c| c.total_correction_mm)
                .collect();
            mean(&mm)
        });
        let distance_m = valid
            .iter()
            .map(|o| o.distance_m)
            .collect::<Option<Vec<f64>>>()
            .filter(|ds| !ds.is_empty())
            .map(|ds| mean(&ds));

        let is_valid = !raw.is_empty();
        HeightDifference {
            segment: first.segment,
            from_point: first.from_point.clone(),
            to_point: first.to_point.clone(),
            raw_delta_m: mean(&raw),
            atmospheric_correction_mm: correction_mm.filter(|_| is_valid),
            corrected_delta_m: mean(&corrected),
            distance_m,
            instrument_count: raw.len(),
            is_valid,
        }
    }
}

/// Validity of one reading pair. A distance is optional, but when present it
/// must be finite and non-negative.
fn classify(backsight: Option<f64>, foresight: Option<f64>, distance_m: Option<f64>) -> ReadingValidity {
    match (backsight, foresight) {
        (None, _) => ReadingValidity::MissingBacksight,
        (_, None) => ReadingValidity::MissingForesight,
        (Some(ar), Some(av)) if !(ar.is_finite() && av.is_finite()) => ReadingValidity::NonFiniteReading,
        _ if distance_m.is_some_and(|d| !d.is_finite() || d < 0.0) => ReadingValidity::NegativeDistance,
        _ => ReadingValidity::Valid,
    }
}

/// Point 0 is the reference; each valid height difference adds one point.
fn accumulate(start_id: &str, initial_altitude_m: f64, height_differences: &[HeightDifference]) -> Vec<AltitudeCalculation> {
    let mut altitudes = vec![AltitudeCalculation {
        point_id: start_id.to_string(),
        altitude_m: initial_altitude_m,
        cumulative_delta_h_m: 0.0,
        is_reference: true,
    }];
    let mut cumulative = 0.0;
    for hd in height_differences.iter().filter(|hd| hd.is_valid) {
        cumulative += hd.corrected_delta_m;
        altitudes.push(AltitudeCalculation {
            point_id: hd.to_point.clone(),
            altitude_m: initial_altitude_m + cumulative,
            cumulative_delta_h_m: cumulative,
            is_reference: false,
        });
    }
    altitudes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::{ApparentLevelCorrection, AtmosphericCorrector, FixedRefraction};
    use crate::domain::{AtmosphericConditions, QualityWarning, ReadingSet, TraverseType};

    /// Single-instrument traverse with AV = 1.000 everywhere.
    fn traverse(ids: &[&str], deltas: &[f64], distance_m: f64) -> Traverse {
        let mut t = Traverse::new(100.0);
        for (i, id) in ids.iter().enumerate() {
            let backsight = deltas.get(i).map(|d| 1.0 + d);
            let (foresight, distance) = if i == 0 { (None, None) } else { (Some(1.0), Some(distance_m)) };
            t = t.with_row(PointRow::single(*id, backsight, foresight, distance));
        }
        t
    }

    fn engine() -> ReductionEngine {
        ReductionEngine::new(LevelingConfig::default()).unwrap()
    }

    #[test]
    fn six_point_traverse_closes_on_known_final() {
        let t = traverse(&["P0", "P1", "P2", "P3", "P4", "P5"], &[0.5, 0.6, 0.4, 0.7, 0.3], 100.0)
            .with_known_final(102.503);
        let r = engine().reduce(&t).unwrap();

        assert_eq!(r.altitudes.len(), 6);
        assert_eq!(r.valid_count() + 1, r.altitudes.len());
        assert!(r.altitudes[0].is_reference);
        assert!((r.final_altitude_m() - 102.5).abs() < 1e-9);
        assert_eq!(r.closure.traverse_type, TraverseType::Closed);
        assert!((r.closure.closure_error_mm.unwrap() + 3.0).abs() < 1e-6);
        assert!((r.closure.total_distance_km - 0.5).abs() < 1e-12);
        // 2 mm * sqrt(0.5 km)
        assert!((r.closure.tolerance_mm - 2.0 * 0.5_f64.sqrt()).abs() < 1e-12);
        assert!(!r.closure.is_acceptable);
        assert!((r.control.residuals_mm.iter().sum::<f64>() + 3.0).abs() < 1e-6);
        assert!(!r.atmospheric_correction_applied);
    }

    #[test]
    fn invalid_row_is_kept_but_skipped() {
        let mut t = traverse(&["A", "B", "C", "D"], &[0.2, 0.3, 0.4], 50.0);
        t.rows[2].readings[0].foresight = None;
        let r = engine().reduce(&t).unwrap();

        assert_eq!(r.height_differences.len(), 3);
        assert!(!r.height_differences[1].is_valid);
        assert_eq!(r.observations[1].validity, ReadingValidity::MissingForesight);
        let ids: Vec<&str> = r.altitudes.iter().map(|a| a.point_id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "D"]);
        assert!((r.final_altitude_m() - 100.6).abs() < 1e-9);
        assert_eq!(r.closure.traverse_type, TraverseType::Open);
    }

    #[test]
    fn non_finite_reading_is_kept_but_skipped() {
        let mut t = traverse(&["A", "B", "C", "D"], &[0.2, 0.3, 0.4], 50.0);
        t.rows[1].readings[0].backsight = Some(f64::NAN);
        t.rows[3].readings[0].foresight = Some(f64::INFINITY);
        let r = engine().reduce(&t).unwrap();

        assert_eq!(r.observations.len(), 3);
        assert_eq!(r.observations[1].validity, ReadingValidity::NonFiniteReading);
        assert_eq!(r.observations[2].validity, ReadingValidity::NonFiniteReading);
        assert!(!r.height_differences[1].is_valid);
        assert!(!r.height_differences[2].is_valid);
        let ids: Vec<&str> = r.altitudes.iter().map(|a| a.point_id.as_str()).collect();
        assert_eq!(ids, ["A", "B"]);
        assert!(r.altitudes.iter().all(|a| a.altitude_m.is_finite()));
    }

    #[test]
    fn known_final_is_not_applied_to_a_cut_chain() {
        let mut t = traverse(&["A", "B", "C"], &[0.3, 0.4], 50.0).with_known_final(100.7);
        t.rows[2].readings[0].foresight = None;
        let r = engine().reduce(&t).unwrap();

        assert_eq!(r.final_point_id(), Some("C"));
        assert!(!r.reaches_final_point());
        assert_eq!(r.closure.closure_error_mm, None);
        assert!(!r.closure.is_acceptable);
        assert!(r.control.residuals_mm.iter().all(|v| *v == 0.0));
        assert!(r.warnings.contains(&QualityWarning::FinalPointNotReached {
            last_point: "B".into(),
            final_point: "C".into(),
        }));
    }

    #[test]
    fn non_finite_known_final_is_rejected() {
        let t = traverse(&["A", "B"], &[0.3], 50.0).with_known_final(f64::NAN);
        let err = engine().reduce(&t).unwrap_err();
        assert!(matches!(err, LevelingError::InvalidConfig { parameter: "known_final_altitude_m", .. }));
    }

    #[test]
    fn negative_distance_marks_row_invalid() {
        let mut t = traverse(&["A", "B", "C"], &[0.2, 0.3], 50.0);
        t.rows[1].readings[0].distance_m = Some(-10.0);
        let r = engine().reduce(&t).unwrap();
        assert_eq!(r.observations[0].validity, ReadingValidity::NegativeDistance);
        assert_eq!(r.altitudes.len(), 2);
    }

    #[test]
    fn all_invalid_is_insufficient() {
        let mut t = traverse(&["A", "B"], &[0.2], 50.0);
        t.rows[0].readings[0].backsight = None;
        let err = engine().reduce(&t).unwrap_err();
        assert!(matches!(err, LevelingError::InsufficientData { valid_points: 1, observations: 1, .. }));

        let lone = Traverse::new(10.0).with_row(PointRow::single("A", Some(1.0), None, None));
        assert_eq!(engine().reduce(&lone).unwrap_err().code(), "INSUFFICIENT_DATA");
    }

    #[test]
    fn instruments_are_averaged_and_controlled() {
        let two = |ar: Option<f64>, av: Option<f64>, ar2: Option<f64>, av2: Option<f64>| {
            vec![ReadingSet::new(ar, av, Some(40.0)), ReadingSet::new(ar2, av2, Some(42.0))]
        };
        let t = Traverse::new(50.0)
            .with_row(PointRow::new("A", two(Some(1.500), None, Some(1.600), None)))
            .with_row(PointRow::new("B", two(Some(1.200), Some(1.000), Some(1.300), Some(1.102))))
            .with_row(PointRow::new("C", two(None, Some(1.100), None, Some(1.200))));
        let r = engine().reduce(&t).unwrap();

        assert_eq!(r.observations.len(), 4);
        let hd = &r.height_differences[0];
        assert_eq!(hd.instrument_count, 2);
        // 0.500 and 0.498
        assert!((hd.corrected_delta_m - 0.499).abs() < 1e-9);
        assert!((hd.distance_m.unwrap() - 41.0).abs() < 1e-12);
        assert_eq!(r.instrument_control.len(), 2);
        assert!((r.instrument_control[0].spread_mm - 2.0).abs() < 1e-6);
        assert!(r.instrument_control.iter().all(|c| c.is_acceptable));
    }

    #[test]
    fn atmospheric_correction_is_applied_per_sight() {
        let strategy = Arc::new(ApparentLevelCorrection::new(
            AtmosphericCorrector::new(FixedRefraction(0.13)),
            AtmosphericConditions::standard(),
        ));
        let engine = ReductionEngine::with_strategy(LevelingConfig::default(), strategy).unwrap();
        let t = traverse(&["A", "B", "C"], &[0.5, -0.2], 200.0);
        let r = engine.reduce(&t).unwrap();

        assert!(r.atmospheric_correction_applied);
        let hd = &r.height_differences[0];
        assert!((hd.atmospheric_correction_mm.unwrap() - 2.7311).abs() < 1e-3);
        assert!((hd.corrected_delta_m - hd.raw_delta_m - 0.0027311).abs() < 1e-6);
        assert!(r.observations[0].atmospheric_correction.is_some());
        assert!((r.final_altitude_m() - (100.3 + 2.0 * 0.0027311)).abs() < 1e-6);
    }

    #[test]
    fn loop_back_to_start_is_closed() {
        let t = traverse(&["BM", "X", "BM"], &[0.8, -0.7988], 120.0);
        let r = engine().reduce(&t).unwrap();
        assert_eq!(r.closure.traverse_type, TraverseType::Closed);
        assert!((r.closure.closure_error_mm.unwrap() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn invalid_config_rejected_up_front() {
        let config = LevelingConfig {
            precision_mm: 0.0,
            ..LevelingConfig::default()
        };
        assert_eq!(ReductionEngine::new(config).unwrap_err().code(), "INVALID_CONFIG");
    }
}
