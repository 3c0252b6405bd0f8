//! Assembly of the linear system for a leveling network.
//!
//! Observation `i` is the `i`-th valid height difference and links altitude
//! entries `i` and `i + 1` of the reduced chain. Points are identified by id,
//! so a loop that returns to its start point observes a fixed point twice.
//!
//! Units: `b` and the solution are in millimeters, weights follow the
//! configured `WeightModel` (distance in km).

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use crate::domain::{CalculationResults, CompensationConfig};
use crate::error::{LevelingError, Result};

/// One row of the design matrix, by point id.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub from_point: String,
    pub to_point: String,
    pub observed_m: f64,
    pub distance_m: f64,
}

#[derive(Debug, Clone)]
pub struct NetworkSystem {
    pub links: Vec<Link>,
    /// Held points and their altitudes (m).
    pub fixed: HashMap<String, f64>,
    pub unknown_ids: Vec<String>,
    /// Provisional altitude of each unknown (m), matching `unknown_ids`.
    pub provisional_m: Vec<f64>,
    pub design: DMatrix<f64>,
    pub weights: DVector<f64>,
    /// `observed - provisional difference`, mm.
    pub misclosure_mm: DVector<f64>,
}

impl NetworkSystem {
    pub fn observation_count(&self) -> usize {
        self.links.len()
    }

    pub fn unknown_count(&self) -> usize {
        self.unknown_ids.len()
    }

    /// Column of `id`, `None` for held points.
    pub fn column(&self, id: &str) -> Option<usize> {
        self.unknown_ids.iter().position(|u| u == id)
    }

    /// Altitude of `id` before adjustment (held value for fixed points).
    pub fn provisional_altitude(&self, id: &str) -> Option<f64> {
        self.fixed
            .get(id)
            .copied()
            .or_else(|| self.column(id).map(|c| self.provisional_m[c]))
    }

    /// Build the system, validating the distance vector against the chain.
    pub fn build(results: &CalculationResults, distances: &[f64], config: &CompensationConfig) -> Result<Self> {
        let observed: Vec<f64> = results.valid_height_differences().map(|hd| hd.corrected_delta_m).collect();
        let m = observed.len();
        if distances.len() != m {
            return Err(LevelingError::DimensionMismatch {
                what: "distances",
                expected: m,
                actual: distances.len(),
            });
        }
        if let Some((index, &d)) = distances.iter().enumerate().find(|(_, d)| !(d.is_finite() && **d > 0.0)) {
            return Err(LevelingError::InvalidDistance {
                index,
                distance_m: d,
                context: "compensation weights need a strictly positive distance",
            });
        }
        // Extra trailing points are kept as unobserved unknowns so that the
        // redundancy check reports them.
        if results.altitudes.len() < m + 1 {
            return Err(LevelingError::DimensionMismatch {
                what: "altitudes",
                expected: m + 1,
                actual: results.altitudes.len(),
            });
        }
        let Some(reference) = results.altitudes.first() else {
            return Err(LevelingError::InsufficientData {
                valid_points: 0,
                observations: m,
                reason: "empty altitude chain".to_string(),
            });
        };

        let mut fixed = HashMap::new();
        fixed.insert(reference.point_id.clone(), reference.altitude_m);
        // The known altitude belongs to the table's last row; a chain cut short
        // by invalid segments ends elsewhere and is not held.
        if config.fix_known_final && results.reaches_final_point() {
            if let (Some(known), Some(last)) = (results.known_final_altitude_m, results.altitudes.last()) {
                fixed.entry(last.point_id.clone()).or_insert(known);
            }
        }

        let mut unknown_ids = Vec::new();
        let mut provisional_m = Vec::new();
        for alt in &results.altitudes {
            if !fixed.contains_key(&alt.point_id) && !unknown_ids.contains(&alt.point_id) {
                unknown_ids.push(alt.point_id.clone());
                provisional_m.push(alt.altitude_m);
            }
        }

        let links: Vec<Link> = results
            .altitudes
            .windows(2)
            .zip(observed.iter().zip(distances))
            .map(|(pair, (&observed_m, &distance_m))| Link {
                from_point: pair[0].point_id.clone(),
                to_point: pair[1].point_id.clone(),
                observed_m,
                distance_m,
            })
            .collect();

        let mut system = NetworkSystem {
            design: DMatrix::zeros(m, unknown_ids.len()),
            weights: DVector::from_iterator(m, distances.iter().map(|&d| config.weight_model.weight(d))),
            misclosure_mm: DVector::zeros(m),
            links,
            fixed,
            unknown_ids,
            provisional_m,
        };
        system.fill();
        Ok(system)
    }

    fn fill(&mut self) {
        for i in 0..self.links.len() {
            let (from, to) = (&self.links[i].from_point, &self.links[i].to_point);
            let (Some(h_from), Some(h_to)) = (self.provisional_altitude(from), self.provisional_altitude(to)) else {
                continue;
            };
            if let Some(c) = self.column(from) {
                self.design[(i, c)] -= 1.0;
            }
            if let Some(c) = self.column(to) {
                self.design[(i, c)] += 1.0;
            }
            self.misclosure_mm[i] = (self.links[i].observed_m - (h_to - h_from)) * 1000.0;
        }
    }
}
