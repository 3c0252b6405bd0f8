//! Weighted least-squares compensation of a reduced traverse.
//!
//! Parametric adjustment: the unknowns are the altitudes of the non-held
//! points, each valid height difference is one observation. The solve is:
//!
//! 1. assemble `A`, `W`, `b` ([`NetworkSystem`]),
//! 2. check redundancy `r = m - n` (`r < 0` is an error),
//! 3. solve the normal equations by Cholesky (singular networks are errors),
//! 4. residuals `v = A x - b`, `v^T W v`, `sigma0_hat^2 = v^T W v / r`,
//! 5. chi-square test of `v^T W v / sigma0^2` against the two-sided interval,
//! 6. posterior standard deviations and blunder screening,
//! 7. overall quality verdict ([`quality::assess`](crate::compensation::quality::assess)).
//!
//! With `r = 0` the network is exactly determined: there is no `sigma0_hat`,
//! the chi-square test is reported as not applicable, and no residual
//! screening happens.

use nalgebra::DVector;
use tracing::debug;

use crate::compensation::blunders::{screen, BlunderScreen};
use crate::compensation::quality::assess;
use crate::compensation::system::NetworkSystem;
use crate::domain::{
    AdjustedPoint, CalculationResults, ChiSquareTest, CompensationConfig, CompensationResults,
    CompensationStatistics, PrecisionCheck,
};
use crate::error::{LevelingError, Result};
use crate::math::{chi_square_interval, solve_weighted};

/// Stateless compensator bound to one configuration.
#[derive(Debug, Clone, Default)]
pub struct NetworkCompensator {
    config: CompensationConfig,
}

impl NetworkCompensator {
    pub fn new(config: CompensationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CompensationConfig {
        &self.config
    }

    /// Adjust `results` with one distance (m) per valid height difference.
    pub fn compensate(&self, results: &CalculationResults, distances: &[f64]) -> Result<CompensationResults> {
        let config = &self.config;
        let system = NetworkSystem::build(results, distances, config)?;
        let m = system.observation_count();
        let n = system.unknown_count();

        if m < n {
            return Err(LevelingError::UnderdeterminedNetwork {
                observations: m,
                unknowns: n,
            });
        }
        if n == 0 {
            return Err(LevelingError::InsufficientData {
                valid_points: results.altitudes.len(),
                observations: m,
                reason: "every point is held fixed, nothing to adjust".to_string(),
            });
        }
        let dof = m - n;

        let solution = solve_weighted(&system.design, &system.weights, &system.misclosure_mm)?;
        let x_mm = &solution.x;
        let residuals: DVector<f64> = &system.design * x_mm - &system.misclosure_mm;
        let weighted_residual_sum = residuals.component_mul(&system.weights).dot(&residuals);

        let sigma0_hat = (dof > 0).then(|| (weighted_residual_sum / dof as f64).sqrt());
        let chi_square = match dof {
            0 => ChiSquareTest::NotApplicable,
            _ => {
                let (lower, upper) = chi_square_interval(dof, config.confidence_level)?;
                let statistic = weighted_residual_sum / (config.prior_sigma0 * config.prior_sigma0);
                ChiSquareTest::Evaluated {
                    statistic,
                    lower,
                    upper,
                    confidence: config.confidence_level,
                    passed: (lower..=upper).contains(&statistic),
                }
            }
        };

        let blunders: Option<BlunderScreen> = match sigma0_hat {
            Some(s0) => Some(screen(
                &system,
                &solution.cofactor,
                &residuals,
                s0,
                dof,
                config.confidence_level,
            )?),
            None => None,
        };

        let scale = sigma0_hat.unwrap_or(config.prior_sigma0);
        let adjusted_altitudes = adjusted_points(results, &system, x_mm, |c| {
            scale * solution.cofactor[(c, c)].max(0.0).sqrt()
        });

        let max_correction_mm = x_mm.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
        let precision_check = PrecisionCheck {
            max_correction_mm,
            target_mm: config.precision_mm,
            within_target: max_correction_mm <= config.precision_mm,
        };

        let statistics = CompensationStatistics {
            observation_count: m,
            unknown_count: n,
            degrees_of_freedom: dof,
            weighted_residual_sum,
            sigma0_hat,
            unit_weight_valid: chi_square.passed(),
            chi_square,
            condition_number: solution.condition_number,
            max_normalized_residual: blunders.as_ref().and_then(BlunderScreen::max_abs),
            blunder_threshold: blunders.as_ref().map(|b| b.threshold),
        };

        debug!(
            observations = m,
            unknowns = n,
            dof,
            sigma0_hat = ?sigma0_hat,
            unit_weight_valid = ?statistics.unit_weight_valid,
            max_correction_mm,
            "network compensated"
        );

        let (normalized_residuals, suspects) = match blunders {
            Some(b) => (b.normalized_residuals, b.suspects),
            None => (Vec::new(), Vec::new()),
        };
        let corrections_mm: Vec<f64> = x_mm.iter().copied().collect();
        let quality = assess(
            &statistics,
            &adjusted_altitudes,
            &corrections_mm,
            suspects.len(),
            config.prior_sigma0,
            config.precision_mm,
        );

        Ok(CompensationResults {
            adjusted_altitudes,
            unknown_ids: system.unknown_ids.clone(),
            corrections_m: corrections_mm.iter().map(|x| x / 1000.0).collect(),
            residuals_mm: residuals.iter().copied().collect(),
            normalized_residuals,
            suspects,
            statistics,
            precision_check,
            quality,
        })
    }
}

/// One adjusted entry per altitude of the chain, in chain order.
fn adjusted_points(
    results: &CalculationResults,
    system: &NetworkSystem,
    x_mm: &DVector<f64>,
    std_dev_mm: impl Fn(usize) -> f64,
) -> Vec<AdjustedPoint> {
    results
        .altitudes
        .iter()
        .map(|alt| {
            let (adjusted, std_dev, is_fixed) = match system.column(&alt.point_id) {
                Some(c) => (system.provisional_m[c] + x_mm[c] / 1000.0, Some(std_dev_mm(c)), false),
                None => (
                    system.fixed.get(&alt.point_id).copied().unwrap_or(alt.altitude_m),
                    None,
                    true,
                ),
            };
            AdjustedPoint {
                point_id: alt.point_id.clone(),
                preliminary_altitude_m: alt.altitude_m,
                adjusted_altitude_m: adjusted,
                correction_m: adjusted - alt.altitude_m,
                std_dev_mm: std_dev,
                is_fixed,
            }
        })
        .collect()
}
