//! Numerical kernels: normal equations, distribution quantiles, statistics.

pub mod normal;
pub mod quantiles;
pub mod stats;

pub use normal::*;
pub use quantiles::*;
pub use stats::*;
