//! Atmospheric (apparent-level) correction of height differences.

pub mod corrector;
pub mod refraction;

pub use corrector::{
    summarize_corrections, strategy_for, ApparentLevelCorrection, AtmosphericCorrector,
    CorrectionSignificance, CorrectionStrategy, CorrectionSummary, NoCorrection, EARTH_RADIUS_M,
};
pub use refraction::{EmpiricalRefraction, FixedRefraction, RefractionModel, STANDARD_REFRACTION};
