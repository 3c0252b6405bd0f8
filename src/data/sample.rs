//! Synthetic leveling traverses with known true altitudes.
//!
//! Used by tests and demonstrations: a random true profile is observed with
//! Gaussian reading noise whose standard deviation grows with the square root
//! of the sight distance, the usual error model of geometric leveling.
//! Everything is driven by a seeded `StdRng`, so a given configuration always
//! yields the same table.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::domain::{PointRow, ReadingSet, Traverse};
use crate::error::{LevelingError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraverseSimulation {
    pub seed: u64,
    /// Distinct points, start included.
    pub point_count: usize,
    pub initial_altitude_m: f64,
    pub sight_min_m: f64,
    pub sight_max_m: f64,
    /// Bound on the true height difference of one segment.
    pub max_step_m: f64,
    /// Reading noise, mm per sqrt(km) of sight.
    pub noise_mm_per_sqrt_km: f64,
    /// Add a last segment back to the start point.
    pub close_loop: bool,
    /// Attach the true final altitude as the known final altitude.
    pub with_known_final: bool,
    pub instruments: usize,
}

impl Default for TraverseSimulation {
    fn default() -> Self {
        Self {
            seed: 7,
            point_count: 10,
            initial_altitude_m: 100.0,
            sight_min_m: 30.0,
            sight_max_m: 120.0,
            max_step_m: 1.5,
            noise_mm_per_sqrt_km: 1.0,
            close_loop: false,
            with_known_final: false,
            instruments: 1,
        }
    }
}

impl TraverseSimulation {
    fn validate(&self) -> Result<()> {
        if self.point_count < 2 {
            return Err(LevelingError::config("point_count", self.point_count, "need at least two points"));
        }
        if self.instruments == 0 {
            return Err(LevelingError::config("instruments", self.instruments, "need at least one instrument"));
        }
        if !(self.sight_min_m.is_finite() && self.sight_max_m.is_finite() && 0.0 < self.sight_min_m && self.sight_min_m <= self.sight_max_m) {
            return Err(LevelingError::config(
                "sight_range",
                format!("{}..{}", self.sight_min_m, self.sight_max_m),
                "expected 0 < min <= max",
            ));
        }
        if !(self.max_step_m.is_finite() && self.max_step_m >= 0.0) {
            return Err(LevelingError::config("max_step_m", self.max_step_m, "must be finite and >= 0"));
        }
        if !(self.noise_mm_per_sqrt_km.is_finite() && self.noise_mm_per_sqrt_km >= 0.0) {
            return Err(LevelingError::config(
                "noise_mm_per_sqrt_km",
                self.noise_mm_per_sqrt_km,
                "must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

/// A generated table together with the profile it was observed from.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTraverse {
    pub traverse: Traverse,
    /// True altitude of every row, in row order.
    pub true_altitudes_m: Vec<f64>,
    /// Sight distance of every segment.
    pub distances_m: Vec<f64>,
}

pub fn simulate_traverse(sim: &TraverseSimulation) -> Result<SimulatedTraverse> {
    sim.validate()?;
    let mut rng = StdRng::seed_from_u64(sim.seed);

    let mut ids: Vec<String> = (0..sim.point_count).map(|i| format!("P{i}")).collect();
    let mut truth = vec![sim.initial_altitude_m];
    for _ in 1..sim.point_count {
        let step = if sim.max_step_m > 0.0 {
            rng.gen_range(-sim.max_step_m..=sim.max_step_m)
        } else {
            0.0
        };
        let last = truth[truth.len() - 1];
        truth.push(last + step);
    }
    if sim.close_loop {
        ids.push(ids[0].clone());
        truth.push(sim.initial_altitude_m);
    }

    let segments = truth.len() - 1;
    let distances_m: Vec<f64> = (0..segments)
        .map(|_| rng.gen_range(sim.sight_min_m..=sim.sight_max_m))
        .collect();

    // readings[row][instrument]
    let mut readings = vec![vec![ReadingSet::default(); sim.instruments]; truth.len()];
    for k in 0..segments {
        let delta = truth[k + 1] - truth[k];
        let sigma_m = sim.noise_mm_per_sqrt_km * (distances_m[k] / 1000.0).sqrt() / 1000.0;
        let noise = Normal::new(0.0, sigma_m)
            .map_err(|e| LevelingError::config("noise_mm_per_sqrt_km", sim.noise_mm_per_sqrt_km, e.to_string()))?;
        for j in 0..sim.instruments {
            let foresight = rng.gen_range(0.8..1.6);
            let backsight = foresight + delta + noise.sample(&mut rng);
            readings[k][j].backsight = Some(backsight);
            readings[k + 1][j].foresight = Some(foresight);
            readings[k + 1][j].distance_m = Some(distances_m[k]);
        }
    }

    let rows = ids.into_iter().zip(readings).map(|(id, r)| PointRow::new(id, r)).collect();
    let known_final = (sim.with_known_final && !sim.close_loop).then(|| truth[truth.len() - 1]);
    Ok(SimulatedTraverse {
        traverse: Traverse {
            rows,
            initial_altitude_m: sim.initial_altitude_m,
            known_final_altitude_m: known_final,
        },
        true_altitudes_m: truth,
        distances_m,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_table() {
        let sim = TraverseSimulation::default();
        assert_eq!(simulate_traverse(&sim).unwrap(), simulate_traverse(&sim).unwrap());
        let other = TraverseSimulation { seed: 8, ..sim };
        assert_ne!(
            simulate_traverse(&TraverseSimulation::default()).unwrap().traverse,
            simulate_traverse(&other).unwrap().traverse
        );
    }

    #[test]
    fn noiseless_readings_reproduce_truth() {
        let sim = TraverseSimulation {
            noise_mm_per_sqrt_km: 0.0,
            instruments: 2,
            ..TraverseSimulation::default()
        };
        let out = simulate_traverse(&sim).unwrap();
        let rows = &out.traverse.rows;
        assert_eq!(rows.len(), 10);
        for k in 0..rows.len() - 1 {
            for j in 0..2 {
                let ar = rows[k].readings[j].backsight.unwrap();
                let av = rows[k + 1].readings[j].foresight.unwrap();
                let truth = out.true_altitudes_m[k + 1] - out.true_altitudes_m[k];
                assert!((ar - av - truth).abs() < 1e-9);
            }
        }
        assert!(rows[0].readings[0].foresight.is_none());
        assert!(rows[9].readings[0].backsight.is_none());
    }

    #[test]
    fn loop_returns_to_start_id() {
        let sim = TraverseSimulation {
            close_loop: true,
            with_known_final: true,
            ..TraverseSimulation::default()
        };
        let out = simulate_traverse(&sim).unwrap();
        let rows = &out.traverse.rows;
        assert_eq!(rows.len(), 11);
        assert_eq!(rows[10].point_id, rows[0].point_id);
        assert_eq!(out.traverse.known_final_altitude_m, None);
        assert_eq!(out.distances_m.len(), 10);
    }

    #[test]
    fn rejects_degenerate_settings() {
        let sim = TraverseSimulation {
            point_count: 1,
            ..TraverseSimulation::default()
        };
        assert_eq!(simulate_traverse(&sim).unwrap_err().code(), "INVALID_CONFIG");
    }
}
