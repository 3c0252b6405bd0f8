//! Traverse closure analysis.

use crate::domain::{AltitudeCalculation, ClosureAnalysis, TolerancePolicy, TraverseType};

/// Inputs that do not live on the altitude chain itself.
#[derive(Debug, Clone, Copy)]
pub struct ClosureInputs<'a> {
    pub initial_altitude_m: f64,
    pub known_final_altitude_m: Option<f64>,
    /// Point the known final altitude belongs to (the table's last row).
    pub final_point_id: &'a str,
    pub total_distance_km: f64,
    pub precision_mm: f64,
    pub tolerance: TolerancePolicy,
}

/// Closure of an altitude chain.
///
/// The expected final altitude is the known one when supplied, otherwise the
/// initial altitude when the chain returns to its start point. With neither,
/// the traverse is open and there is no closure error to judge.
///
/// A known final altitude only applies when the chain actually ends on
/// `final_point_id`. When invalid trailing segments cut the chain short, the
/// traverse cannot be closed and is reported as not acceptable.
pub fn analyze_closure(altitudes: &[AltitudeCalculation], inputs: &ClosureInputs<'_>) -> ClosureAnalysis {
    let loops_back = match (altitudes.first(), altitudes.last()) {
        (Some(first), Some(last)) => altitudes.len() > 1 && first.point_id == last.point_id,
        _ => false,
    };
    let reaches_final = altitudes
        .last()
        .is_some_and(|last| last.point_id == inputs.final_point_id);
    let unreachable_known = inputs.known_final_altitude_m.is_some() && !reaches_final && !loops_back;
    let computed_final = altitudes
        .last()
        .map(|a| a.altitude_m)
        .unwrap_or(inputs.initial_altitude_m);

    let expected_final = inputs
        .known_final_altitude_m
        .filter(|_| reaches_final)
        .or(loops_back.then_some(inputs.initial_altitude_m));
    let traverse_type = if expected_final.is_some() {
        TraverseType::Closed
    } else {
        TraverseType::Open
    };

    let km = inputs.total_distance_km;
    let tolerance_mm = inputs.tolerance.tolerance_mm(inputs.precision_mm, km);
    let closure_error_mm = expected_final.map(|known| (computed_final - known) * 1000.0);

    ClosureAnalysis {
        traverse_type,
        closure_error_mm,
        tolerance_mm,
        is_acceptable: !unreachable_known && closure_error_mm.is_none_or(|e| e.abs() <= tolerance_mm),
        total_distance_km: km,
        error_per_km_mm: closure_error_mm.filter(|_| km > 0.0).map(|e| e / km),
        precision_ratio: closure_error_mm
            .filter(|_| tolerance_mm > 0.0)
            .map(|e| e.abs() / tolerance_mm),
    }
}
