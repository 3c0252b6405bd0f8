//! Normalized residuals and blunder screening.
//!
//! With `Q_x = N^-1` the residual cofactors are `Q_v = W^-1 - A Q_x A^T`.
//! Only the diagonal is needed:
//!
//! ```text
//! q_vv,i = 1 / w_i - a_i Q_x a_i^T
//! w_i    = v_i / (sigma0_hat * sqrt(q_vv,i))
//! ```
//!
//! An observation is suspect when `|w_i|` exceeds the two-sided Student-t
//! critical value for the redundancy of the network.

use nalgebra::{DMatrix, DVector};

use crate::compensation::system::NetworkSystem;
use crate::domain::SuspectObservation;
use crate::error::Result;
use crate::math::student_t_critical;

/// Below this a residual is fully determined by the network (no control).
const MIN_COFACTOR: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct BlunderScreen {
    pub normalized_residuals: Vec<f64>,
    pub threshold: f64,
    pub suspects: Vec<SuspectObservation>,
}

impl BlunderScreen {
    pub fn max_abs(&self) -> Option<f64> {
        self.normalized_residuals.iter().map(|w| w.abs()).reduce(f64::max)
    }
}

/// Diagonal of `Q_v`.
pub fn residual_cofactors(design: &DMatrix<f64>, weights: &DVector<f64>, cofactor: &DMatrix<f64>) -> Vec<f64> {
    design
        .row_iter()
        .zip(weights.iter())
        .map(|(row, w)| {
            let q = (&row * cofactor).dot(&row);
            1.0 / w - q
        })
        .collect()
}

/// Screen residuals (mm) of a network with `dof > 0`.
pub fn screen(
    system: &NetworkSystem,
    cofactor: &DMatrix<f64>,
    residuals_mm: &DVector<f64>,
    sigma0_hat: f64,
    dof: usize,
    confidence: f64,
) -> Result<BlunderScreen> {
    let threshold = student_t_critical(dof, confidence)?;
    let q_vv = residual_cofactors(&system.design, &system.weights, cofactor);

    let normalized_residuals: Vec<f64> = residuals_mm
        .iter()
        .zip(&q_vv)
        .map(|(&v, &q)| {
            if sigma0_hat > 0.0 && q > MIN_COFACTOR {
                v / (sigma0_hat * q.sqrt())
            } else {
                0.0
            }
        })
        .collect();

    let suspects = normalized_residuals
        .iter()
        .enumerate()
        .filter(|(_, w)| w.abs() > threshold)
        .map(|(index, &w)| {
            let link = &system.links[index];
            SuspectObservation {
                index,
                from_point: link.from_point.clone(),
                to_point: link.to_point.clone(),
                residual_mm: residuals_mm[index],
                normalized_residual: w,
            }
        })
        .collect();

    Ok(BlunderScreen {
        normalized_residuals,
        threshold,
        suspects,
    })
}
