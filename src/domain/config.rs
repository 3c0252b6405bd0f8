//! Run configuration for the reduction engine and the compensator.
//!
//! Both configs are explicit values handed to each call; nothing here is
//! global. `from_env` lets a host application pick up `LEVELING_*` overrides
//! (optionally from a `.env` file) on top of the defaults.

use serde::{Deserialize, Serialize};

use crate::domain::AtmosphericConditions;
use crate::error::{LevelingError, Result};

/// Realistic bounds for the target precision.
const PRECISION_MIN_MM: f64 = 0.1;
const PRECISION_MAX_MM: f64 = 50.0;

/// How the closure tolerance grows with traverse length.
///
/// Leveling practice scales the tolerance with `sqrt(km)`; the coefficient is
/// left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TolerancePolicy {
    /// `factor * precision_mm * sqrt(km)`.
    ScaledPrecision { factor: f64 },
    /// `mm * sqrt(km)`, independent of the target precision (e.g. `4 mm sqrt(K)`).
    PerSqrtKm { mm: f64 },
}

impl TolerancePolicy {
    pub fn tolerance_mm(&self, precision_mm: f64, distance_km: f64) -> f64 {
        let root = distance_km.max(0.0).sqrt();
        match *self {
            TolerancePolicy::ScaledPrecision { factor } => factor * precision_mm * root,
            TolerancePolicy::PerSqrtKm { mm } => mm * root,
        }
    }

    fn validate(&self) -> Result<()> {
        let (name, v) = match *self {
            TolerancePolicy::ScaledPrecision { factor } => ("tolerance.factor", factor),
            TolerancePolicy::PerSqrtKm { mm } => ("tolerance.mm", mm),
        };
        if !(v.is_finite() && v > 0.0) {
            return Err(LevelingError::config(name, v, "must be finite and > 0"));
        }
        Ok(())
    }
}

impl Default for TolerancePolicy {
    fn default() -> Self {
        TolerancePolicy::ScaledPrecision { factor: 1.0 }
    }
}

/// Observation weighting used by the compensator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightModel {
    /// `w = 1 / d_km`.
    InverseDistance,
    /// `w = 1 / (a^2 + (b * d_km)^2)` with `a` in mm and `b` in mm/km.
    Variance { instrumental_mm: f64, kilometric_mm: f64 },
}

impl WeightModel {
    /// Weight for a strictly positive distance in meters.
    pub fn weight(&self, distance_m: f64) -> f64 {
        let d_km = distance_m / 1000.0;
        match *self {
            WeightModel::InverseDistance => 1.0 / d_km,
            WeightModel::Variance {
                instrumental_mm,
                kilometric_mm,
            } => {
                let b = kilometric_mm * d_km;
                1.0 / (instrumental_mm * instrumental_mm + b * b)
            }
        }
    }
}

impl Default for WeightModel {
    fn default() -> Self {
        WeightModel::InverseDistance
    }
}

/// Configuration of the reduction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelingConfig {
    /// Target precision in millimeters.
    pub precision_mm: f64,
    pub tolerance: TolerancePolicy,
    pub atmospheric_correction: bool,
    pub conditions: AtmosphericConditions,
    /// Maximum spread between instruments on one segment.
    pub instrument_tolerance_mm: f64,
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            precision_mm: 2.0,
            tolerance: TolerancePolicy::default(),
            atmospheric_correction: false,
            conditions: AtmosphericConditions::standard(),
            instrument_tolerance_mm: 5.0,
        }
    }
}

impl LevelingConfig {
    pub fn with_atmospheric_correction(mut self, conditions: AtmosphericConditions) -> Self {
        self.atmospheric_correction = true;
        self.conditions = conditions;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_precision(self.precision_mm)?;
        self.tolerance.validate()?;
        if !(self.instrument_tolerance_mm.is_finite() && self.instrument_tolerance_mm > 0.0) {
            return Err(LevelingError::config(
                "instrument_tolerance_mm",
                self.instrument_tolerance_mm,
                "must be finite and > 0",
            ));
        }
        let c = &self.conditions;
        if !(c.temperature_c.is_finite() && c.pressure_hpa.is_finite() && c.humidity_percent.is_finite()) {
            return Err(LevelingError::config(
                "conditions",
                format!("{}°C/{}hPa/{}%", c.temperature_c, c.pressure_hpa, c.humidity_percent),
                "atmospheric conditions must be finite",
            ));
        }
        Ok(())
    }

    /// Defaults overridden by `LEVELING_*` environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`LevelingConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "LEVELING_PRECISION_MM")? {
            config.precision_mm = v;
        }
        if let Some(mm) = parse_var(&lookup, "LEVELING_TOLERANCE_MM_PER_SQRT_KM")? {
            config.tolerance = TolerancePolicy::PerSqrtKm { mm };
        }
        if let Some(v) = parse_var(&lookup, "LEVELING_INSTRUMENT_TOLERANCE_MM")? {
            config.instrument_tolerance_mm = v;
        }
        if let Some(v) = parse_var(&lookup, "LEVELING_ATMOSPHERIC")? {
            config.atmospheric_correction = v;
        }
        if let Some(v) = parse_var(&lookup, "LEVELING_TEMPERATURE_C")? {
            config.conditions.temperature_c = v;
        }
        if let Some(v) = parse_var(&lookup, "LEVELING_PRESSURE_HPA")? {
            config.conditions.pressure_hpa = v;
        }
        if let Some(v) = parse_var(&lookup, "LEVELING_HUMIDITY_PERCENT")? {
            config.conditions.humidity_percent = v;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Configuration of the compensation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationConfig {
    /// Target precision for the advisory correction check.
    pub precision_mm: f64,
    /// Two-sided confidence of the chi-square and blunder tests.
    pub confidence_level: f64,
    /// A priori standard deviation of unit weight (mm/sqrt(km) with inverse
    /// distance weights).
    pub prior_sigma0: f64,
    pub weight_model: WeightModel,
    /// Hold the last point at the known final altitude as a second datum.
    pub fix_known_final: bool,
}

impl Default for CompensationConfig {
    fn default() -> Self {
        Self {
            precision_mm: 2.0,
            confidence_level: 0.95,
            prior_sigma0: 1.0,
            weight_model: WeightModel::default(),
            fix_known_final: false,
        }
    }
}

impl CompensationConfig {
    pub fn validate(&self) -> Result<()> {
        validate_precision(self.precision_mm)?;
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(LevelingError::config(
                "confidence_level",
                self.confidence_level,
                "must lie strictly between 0 and 1",
            ));
        }
        if !(self.prior_sigma0.is_finite() && self.prior_sigma0 > 0.0) {
            return Err(LevelingError::config("prior_sigma0", self.prior_sigma0, "must be finite and > 0"));
        }
        if let WeightModel::Variance {
            instrumental_mm,
            kilometric_mm,
        } = self.weight_model
        {
            let ok = instrumental_mm.is_finite()
                && kilometric_mm.is_finite()
                && instrumental_mm >= 0.0
                && kilometric_mm >= 0.0
                && (instrumental_mm > 0.0 || kilometric_mm > 0.0);
            if !ok {
                return Err(LevelingError::config(
                    "weight_model",
                    format!("a={instrumental_mm}mm b={kilometric_mm}mm/km"),
                    "variance terms must be non-negative and not both zero",
                ));
            }
        }
        Ok(())
    }

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "LEVELING_PRECISION_MM")? {
            config.precision_mm = v;
        }
        if let Some(v) = parse_var(&lookup, "LEVELING_CONFIDENCE")? {
            config.confidence_level = v;
        }
        if let Some(v) = parse_var(&lookup, "LEVELING_PRIOR_SIGMA0")? {
            config.prior_sigma0 = v;
        }
        if let Some(v) = parse_var(&lookup, "LEVELING_FIX_KNOWN_FINAL")? {
            config.fix_known_final = v;
        }
        config.validate()?;
        Ok(config)
    }
}

fn validate_precision(precision_mm: f64) -> Result<()> {
    if !(PRECISION_MIN_MM..=PRECISION_MAX_MM).contains(&precision_mm) {
        return Err(LevelingError::config(
            "precision_mm",
            precision_mm,
            format!("expected {PRECISION_MIN_MM}..={PRECISION_MAX_MM} mm"),
        ));
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| LevelingError::config(name, raw, "unparseable value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn tolerance_scales_with_sqrt_km() {
        let policy = TolerancePolicy::default();
        assert!((policy.tolerance_mm(2.0, 4.0) - 4.0).abs() < 1e-12);
        let fixed = TolerancePolicy::PerSqrtKm { mm: 4.0 };
        assert!((fixed.tolerance_mm(2.0, 0.25) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_distance_weight_uses_km() {
        let w = WeightModel::InverseDistance.weight(250.0);
        assert!((w - 4.0).abs() < 1e-12);
    }

    #[test]
    fn env_overrides_apply() {
        let config = LevelingConfig::from_lookup(lookup(&[
            ("LEVELING_PRECISION_MM", "1.5"),
            ("LEVELING_ATMOSPHERIC", "true"),
            ("LEVELING_TEMPERATURE_C", "25"),
        ]))
        .unwrap();
        assert_eq!(config.precision_mm, 1.5);
        assert!(config.atmospheric_correction);
        assert_eq!(config.conditions.temperature_c, 25.0);

        let comp = CompensationConfig::from_lookup(lookup(&[("LEVELING_CONFIDENCE", "0.99")])).unwrap();
        assert_eq!(comp.confidence_level, 0.99);
    }

    #[test]
    fn unparseable_env_value_is_reported() {
        let err = LevelingConfig::from_lookup(lookup(&[("LEVELING_PRECISION_MM", "two")])).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("LEVELING_PRECISION_MM"));
    }

    #[test]
    fn out_of_range_precision_rejected() {
        let config = LevelingConfig {
            precision_mm: 80.0,
            ..LevelingConfig::default()
        };
        assert!(config.validate().is_err());

        let comp = CompensationConfig {
            confidence_level: 1.0,
            ..CompensationConfig::default()
        };
        assert!(comp.validate().is_err());
    }
}
