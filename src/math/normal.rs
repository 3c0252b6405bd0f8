//! Weighted normal-equation solver.
//!
//! A leveling adjustment solves
//!
//! ```text
//! minimize Σ w_i (a_i^T x - b_i)^2
//! ```
//!
//! through the normal equations `(A^T W A) x = A^T W b`.
//!
//! Implementation choices:
//! - `W` is diagonal, so `A^T W A` is formed by scaling the rows of `A` by
//!   `w_i` instead of materializing an `m x m` matrix.
//! - The normal matrix is symmetric positive definite for a connected
//!   network, so we factor it with Cholesky and take `N^-1` from the same
//!   factor. A failed factorization is a singular network: there is no
//!   pseudo-inverse fallback.
//! - Networks are tens to low hundreds of points, so dense matrices are fine.

use nalgebra::{DMatrix, DVector};

use crate::error::{LevelingError, Result};

/// Smallest accepted ratio `lambda_min / lambda_max` of the normal matrix.
const MIN_EIGEN_RATIO: f64 = 1e-12;

/// Solution of a weighted normal system.
#[derive(Debug, Clone)]
pub struct NormalSolution {
    pub x: DVector<f64>,
    /// Cofactor matrix of the unknowns, `Q_x = N^-1`.
    pub cofactor: DMatrix<f64>,
    /// `lambda_max / lambda_min` of `N`.
    pub condition_number: f64,
}

/// `A^T W A` for diagonal `W` given as a vector of weights.
pub fn normal_matrix(a: &DMatrix<f64>, w: &DVector<f64>) -> DMatrix<f64> {
    let wa = DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[(i, j)] * w[i]);
    a.transpose() * wa
}

/// Solve `(A^T W A) x = A^T W b`.
pub fn solve_weighted(a: &DMatrix<f64>, w: &DVector<f64>, b: &DVector<f64>) -> Result<NormalSolution> {
    let (m, n) = a.shape();
    if w.len() != m {
        return Err(LevelingError::DimensionMismatch {
            what: "weights",
            expected: m,
            actual: w.len(),
        });
    }
    if b.len() != m {
        return Err(LevelingError::DimensionMismatch {
            what: "right-hand side",
            expected: m,
            actual: b.len(),
        });
    }

    let singular = |detail: String| LevelingError::SingularNetwork {
        observations: m,
        unknowns: n,
        detail,
    };

    let normal = normal_matrix(a, w);
    let rhs = a.transpose() * w.component_mul(b);

    let eigen = normal.symmetric_eigenvalues();
    let lambda_max = eigen.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lambda_min = eigen.iter().copied().fold(f64::INFINITY, f64::min);
    if !(lambda_max.is_finite() && lambda_min.is_finite()) || lambda_max <= 0.0 {
        return Err(singular(format!("eigenvalues [{lambda_min:e}, {lambda_max:e}]")));
    }
    if lambda_min <= lambda_max * MIN_EIGEN_RATIO {
        return Err(singular(format!(
            "smallest eigenvalue {lambda_min:e} vs largest {lambda_max:e}"
        )));
    }

    let chol = normal
        .cholesky()
        .ok_or_else(|| singular("Cholesky factorization failed".to_string()))?;
    let x = chol.solve(&rhs);
    if !x.iter().all(|v| v.is_finite()) {
        return Err(singular("non-finite solution".to_string()));
    }

    Ok(NormalSolution {
        x,
        cofactor: chol.inverse(),
        condition_number: lambda_max / lambda_min,
    })
}
