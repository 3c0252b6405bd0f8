//! Shared "reduce then compensate" workflow.
//!
//! Keeping this in one place avoids duplicating the core sequence in every
//! front-end:
//! traverse table -> reduction -> distance extraction -> compensation
//!
//! Callers that need to inspect the reduction before deciding to compensate
//! can call the two stages directly instead.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compensation::NetworkCompensator;
use crate::domain::{CalculationResults, CompensationConfig, CompensationResults, LevelingConfig, Traverse};
use crate::error::Result;
use crate::reduction::ReductionEngine;

/// All computed outputs of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelingRun {
    pub calculation: CalculationResults,
    pub compensation: CompensationResults,
}

/// Reduce `traverse`, then compensate it with the sight distances of its
/// valid height differences.
pub fn run(traverse: &Traverse, leveling: &LevelingConfig, compensation: &CompensationConfig) -> Result<LevelingRun> {
    let engine = ReductionEngine::new(leveling.clone())?;
    let compensator = NetworkCompensator::new(compensation.clone())?;

    let calculation = engine.reduce(traverse)?;
    let distances = calculation.observation_distances()?;
    debug!(observations = distances.len(), "reduction done, compensating");
    let compensation = compensator.compensate(&calculation, &distances)?;

    Ok(LevelingRun {
        calculation,
        compensation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{simulate_traverse, TraverseSimulation};

    #[test]
    fn simulated_loop_runs_end_to_end() {
        let sim = simulate_traverse(&TraverseSimulation {
            close_loop: true,
            ..TraverseSimulation::default()
        })
        .unwrap();
        let out = run(&sim.traverse, &LevelingConfig::default(), &CompensationConfig::default()).unwrap();

        assert_eq!(out.calculation.altitudes.len(), 11);
        assert_eq!(out.compensation.adjusted_altitudes.len(), 11);
        assert_eq!(out.compensation.statistics.degrees_of_freedom, 1);
        let start = &out.compensation.adjusted_altitudes;
        assert_eq!(start[0].adjusted_altitude_m, start[10].adjusted_altitude_m);
    }

    #[test]
    fn missing_distance_stops_before_compensation() {
        let mut sim = simulate_traverse(&TraverseSimulation::default()).unwrap();
        sim.traverse.rows[3].readings[0].distance_m = None;
        let err = run(&sim.traverse, &LevelingConfig::default(), &CompensationConfig::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_DISTANCE");
    }
}
