//! Error taxonomy for reduction and compensation.
//!
//! Per-row problems in the observation table are never errors: the reduction
//! engine marks the row invalid and keeps going. The variants below are the
//! structural failures that stop a stage, and each carries the counts or
//! values needed to tell the user what went wrong.

pub type Result<T> = std::result::Result<T, LevelingError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LevelingError {
    /// Fewer than two usable points, or no valid observation at all.
    #[error("Insufficient data: {valid_points} valid point(s) from {observations} observation(s) ({reason})")]
    InsufficientData {
        valid_points: usize,
        observations: usize,
        reason: String,
    },

    /// A negative distance given to the corrector, or a non-positive one given
    /// to the compensator.
    #[error("Invalid distance at observation {index}: {distance_m} m ({context})")]
    InvalidDistance {
        index: usize,
        distance_m: f64,
        context: &'static str,
    },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The normal matrix is not positive definite (some point is not tied to
    /// the datum by any observation chain).
    #[error(
        "Singular network: normal matrix {unknowns}x{unknowns} from {observations} observation(s) is not positive definite ({detail})"
    )]
    SingularNetwork {
        observations: usize,
        unknowns: usize,
        detail: String,
    },

    #[error("Underdetermined network: {observations} observation(s) for {unknowns} unknown(s)")]
    UnderdeterminedNetwork { observations: usize, unknowns: usize },

    #[error("Invalid configuration: {parameter} = {value} ({reason})")]
    InvalidConfig {
        parameter: &'static str,
        value: String,
        reason: String,
    },
}

impl LevelingError {
    /// Stable short code for callers that map errors to UI messages or exit
    /// statuses.
    pub fn code(&self) -> &'static str {
        match self {
            LevelingError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            LevelingError::InvalidDistance { .. } => "INVALID_DISTANCE",
            LevelingError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            LevelingError::SingularNetwork { .. } => "SINGULAR_NETWORK",
            LevelingError::UnderdeterminedNetwork { .. } => "UNDERDETERMINED_NETWORK",
            LevelingError::InvalidConfig { .. } => "INVALID_CONFIG",
        }
    }

    pub(crate) fn config(parameter: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        LevelingError::InvalidConfig {
            parameter,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_dimensions() {
        let err = LevelingError::UnderdeterminedNetwork {
            observations: 3,
            unknowns: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains('3') && msg.contains('5'), "{msg}");
        assert_eq!(err.code(), "UNDERDETERMINED_NETWORK");
    }

    #[test]
    fn mismatch_mentions_both_lengths() {
        let err = LevelingError::DimensionMismatch {
            what: "distances",
            expected: 5,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch for distances: expected 5, got 4"
        );
    }
}
