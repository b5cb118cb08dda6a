//! Decoder and statistics configuration
//!
//! Both structs deserialize from partial JSON: missing fields take the
//! protocol defaults.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::history::DEFAULT_RR_CAPACITY;
use crate::stats::{D2Sweep, DEFAULT_RESAMPLE_HZ};

/// Lowest plausible RR interval (ms)
pub const RR_MIN_MS: u16 = 300;
/// Highest plausible RR interval (ms)
pub const RR_MAX_MS: u16 = 2000;

/// Per-connection decoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// RR samples retained per connection
    pub rr_capacity: usize,
    pub rr_min_ms: u16,
    pub rr_max_ms: u16,
    /// Event-time resolution of BLE CSC sensors
    pub csc_tick_rate_hz: u32,
    /// Stride readings averaged by the Zephyr cadence workaround
    pub stride_window: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            rr_capacity: DEFAULT_RR_CAPACITY,
            rr_min_ms: RR_MIN_MS,
            rr_max_ms: RR_MAX_MS,
            csc_tick_rate_hz: 1024,
            stride_window: 10,
        }
    }
}

impl SensorConfig {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.rr_min_ms >= self.rr_max_ms {
            return Err(ComputeError::InvalidConfig(format!(
                "rr_min_ms ({}) must be below rr_max_ms ({})",
                self.rr_min_ms, self.rr_max_ms
            )));
        }
        if self.csc_tick_rate_hz == 0 {
            return Err(ComputeError::InvalidConfig(
                "csc_tick_rate_hz must be positive".to_string(),
            ));
        }
        if self.stride_window < 2 {
            return Err(ComputeError::InvalidConfig(
                "stride_window needs at least two readings".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether an RR interval (ms) is physiologically plausible
    pub fn rr_in_range(&self, rr_ms: i64) -> bool {
        (i64::from(self.rr_min_ms)..=i64::from(self.rr_max_ms)).contains(&rr_ms)
    }
}

/// Parameters of the HRV summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HrvConfig {
    /// Template length `m` for approximate and sample entropy
    pub embedding_dimension: usize,
    /// Entropy tolerance as a fraction of the series' standard deviation
    pub tolerance_factor: f64,
    /// Embedding dimension for the correlation dimension
    pub d2_embedding: usize,
    pub d2_sweep: D2Sweep,
    /// Tachogram resampling rate for the spectrum (Hz)
    pub resample_hz: f64,
}

impl Default for HrvConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: 2,
            tolerance_factor: 0.2,
            d2_embedding: 10,
            d2_sweep: D2Sweep::default(),
            resample_hz: DEFAULT_RESAMPLE_HZ,
        }
    }
}

impl HrvConfig {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.embedding_dimension == 0 || self.d2_embedding == 0 {
            return Err(ComputeError::InvalidConfig(
                "embedding dimensions must be positive".to_string(),
            ));
        }
        if !(self.tolerance_factor > 0.0) {
            return Err(ComputeError::InvalidConfig(
                "tolerance_factor must be positive".to_string(),
            ));
        }
        if !(self.resample_hz > 0.0) {
            return Err(ComputeError::InvalidConfig(
                "resample_hz must be positive".to_string(),
            ));
        }
        if self.d2_sweep.bins < 3 || !(self.d2_sweep.step > 0.0) {
            return Err(ComputeError::InvalidConfig(
                "d2_sweep needs at least three bins and a positive step".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_carry_protocol_constants() {
        let config = SensorConfig::default();
        assert_eq!(config.rr_min_ms, 300);
        assert_eq!(config.rr_max_ms, 2000);
        assert_eq!(config.csc_tick_rate_hz, 1024);
        assert!(config.rr_in_range(300));
        assert!(config.rr_in_range(2000));
        assert!(!config.rr_in_range(299));
        assert!(!config.rr_in_range(2001));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = SensorConfig::from_json(r#"{"rr_capacity": 64}"#).unwrap();
        assert_eq!(
            config,
            SensorConfig {
                rr_capacity: 64,
                ..SensorConfig::default()
            }
        );

        let hrv = HrvConfig::from_json(r#"{"d2_sweep": {"bins": 50}}"#).unwrap();
        assert_eq!(hrv.d2_sweep.bins, 50);
        assert_eq!(hrv.d2_sweep.start, -3.0);
        assert_eq!(hrv.embedding_dimension, 2);
    }

    #[test]
    fn test_json_round_trip() {
        let config = HrvConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(HrvConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(SensorConfig::from_json(r#"{"rr_min_ms": 2000, "rr_max_ms": 300}"#).is_err());
        assert!(SensorConfig::from_json(r#"{"csc_tick_rate_hz": 0}"#).is_err());
        assert!(HrvConfig::from_json(r#"{"tolerance_factor": -0.1}"#).is_err());
        assert!(HrvConfig::from_json("not json").is_err());
    }
}
