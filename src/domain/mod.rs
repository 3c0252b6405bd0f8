//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the traverse table handed over by ingestion (`Traverse`, `PointRow`, `ReadingSet`)
//! - reduction output (`CalculationResults` and its parts)
//! - compensation output (`CompensationResults`, `CompensationStatistics`)
//! - run configuration (`LevelingConfig`, `CompensationConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
