//! Refraction-coefficient policies.
//!
//! The coefficient `k` (m.r.a) describes how strongly the line of sight bends.
//! Typical daytime values sit between 0.10 and 0.20. The mapping from weather
//! to `k` is an empirical calibration, so it is a trait: callers with their
//! own calibration plug it in, callers without one use [`EmpiricalRefraction`].

use chrono::Timelike;

use crate::domain::AtmosphericConditions;

/// Standard coefficient for a 15 °C / 1013.25 hPa / 60 % atmosphere.
pub const STANDARD_REFRACTION: f64 = 0.13;

pub trait RefractionModel: std::fmt::Debug + Send + Sync {
    fn coefficient(&self, conditions: &AtmosphericConditions) -> f64;
}

/// A constant coefficient regardless of the weather.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRefraction(pub f64);

impl RefractionModel for FixedRefraction {
    fn coefficient(&self, _conditions: &AtmosphericConditions) -> f64 {
        self.0
    }
}

/// Linear regression around the standard atmosphere, clamped to a safe range.
///
/// ```text
/// k = base
///   - per_degree  * (T - 15)
///   + per_hpa     * (P - 1013.25)
///   + per_percent * (H - 60)
///   + time-of-day offset
/// ```
///
/// The time-of-day offset models the thermal gradient near the ground:
/// `warm_offset` between 10:00 and 16:00, `cool_offset` at or before 08:00 and
/// at or after 18:00, zero otherwise or when the time is unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmpiricalRefraction {
    pub base: f64,
    pub per_degree: f64,
    pub per_hpa: f64,
    pub per_percent: f64,
    pub warm_offset: f64,
    pub cool_offset: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for EmpiricalRefraction {
    fn default() -> Self {
        Self {
            base: STANDARD_REFRACTION,
            per_degree: 0.004,
            per_hpa: 0.0001,
            per_percent: 0.0002,
            warm_offset: 0.02,
            cool_offset: -0.01,
            min: 0.05,
            max: 0.25,
        }
    }
}

impl EmpiricalRefraction {
    fn time_offset(&self, conditions: &AtmosphericConditions) -> f64 {
        let Some(time) = conditions.observed_at else {
            return 0.0;
        };
        match time.hour() {
            10..=16 => self.warm_offset,
            h if h <= 8 || h >= 18 => self.cool_offset,
            _ => 0.0,
        }
    }
}

impl RefractionModel for EmpiricalRefraction {
    fn coefficient(&self, conditions: &AtmosphericConditions) -> f64 {
        let k = self.base - (conditions.temperature_c - 15.0) * self.per_degree
            + (conditions.pressure_hpa - 1013.25) * self.per_hpa
            + (conditions.humidity_percent - 60.0) * self.per_percent
            + self.time_offset(conditions);
        if !k.is_finite() {
            return self.base;
        }
        k.clamp(self.min, self.max)
    }
}
