//! Distribution quantiles for the adjustment tests.

use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

use crate::error::{LevelingError, Result};

/// Two-sided acceptance interval of a chi-square variable with `dof` degrees
/// of freedom: `[q((1 - c) / 2), q((1 + c) / 2)]`.
pub fn chi_square_interval(dof: usize, confidence: f64) -> Result<(f64, f64)> {
    check_confidence(confidence)?;
    let dist = ChiSquared::new(dof as f64)
        .map_err(|e| LevelingError::config("degrees_of_freedom", dof, e.to_string()))?;
    let alpha = 1.0 - confidence;
    Ok((dist.inverse_cdf(alpha / 2.0), dist.inverse_cdf(1.0 - alpha / 2.0)))
}

/// Two-sided Student-t critical value `t((1 + c) / 2, dof)`.
pub fn student_t_critical(dof: usize, confidence: f64) -> Result<f64> {
    check_confidence(confidence)?;
    let dist = StudentsT::new(0.0, 1.0, dof as f64)
        .map_err(|e| LevelingError::config("degrees_of_freedom", dof, e.to_string()))?;
    Ok(dist.inverse_cdf(0.5 + confidence / 2.0))
}

fn check_confidence(confidence: f64) -> Result<()> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(LevelingError::config(
            "confidence_level",
            confidence,
            "must lie strictly between 0 and 1",
        ));
    }
    Ok(())
}
