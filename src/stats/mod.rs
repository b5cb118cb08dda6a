//! HRV statistics engine
//!
//! Stateless functions over RR-interval slices (milliseconds unless noted).
//! Undefined results are reported as [`StatsError`] from precondition checks;
//! [`HrvSummary::compute`] folds them to zero for display and export.

mod descriptive;
mod dimension;
mod entropy;
mod regression;
mod spectrum;
mod time_domain;

use serde::{Deserialize, Serialize};

use crate::config::HrvConfig;
use crate::error::StatsError;

pub use descriptive::{
    abs_successive_diffs, index_of_max, index_of_min, max, mean, min, std_dev, successive_diffs,
    sum, variance,
};
pub use dimension::{correlation_dimension, correlation_sum, D2Sweep};
pub use entropy::{approximate_entropy, sample_entropy_ratio};
pub use regression::{linear_regression, Regression};
pub use spectrum::{
    band_powers, periodogram, BandPowers, DEFAULT_RESAMPLE_HZ, HF_MAX_HZ, LF_MAX_HZ,
    MAX_RESAMPLED_LEN, VLF_MAX_HZ,
};
pub use time_domain::{heart_rate_from_last, rmssd, sd1, sd2, sdnn, sdsd};

/// Every HRV metric over one RR window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HrvSummary {
    /// Number of RR intervals the summary was computed from
    pub samples: usize,
    pub mean_rr: f64,
    pub sdnn: f64,
    pub sdsd: f64,
    pub rmssd: f64,
    pub sd1: f64,
    pub sd2: f64,
    /// Heart rate implied by the most recent interval (bpm)
    pub heart_rate: f64,
    pub apen: f64,
    pub sampen: f64,
    /// Correlation dimension, computed on intervals in seconds
    pub d2: f64,
    pub vlf: f64,
    pub lf: f64,
    pub hf: f64,
    pub lf_hf: f64,
}

fn or_zero(metric: &'static str, result: Result<f64, StatsError>) -> f64 {
    match result {
        Ok(value) if value.is_finite() => value,
        Ok(value) => {
            log::debug!("{metric} not finite ({value}), reporting 0");
            0.0
        }
        Err(e) => {
            log::debug!("{metric} undefined: {e}");
            0.0
        }
    }
}

impl HrvSummary {
    /// Compute all metrics; any metric undefined for this window is 0
    pub fn compute(rr: &[f64], config: &HrvConfig) -> Self {
        let tolerance = std_dev(rr).map(|sd| sd * config.tolerance_factor);
        let m = config.embedding_dimension;
        let seconds: Vec<f64> = rr.iter().map(|v| v / 1000.0).collect();

        let bands = periodogram(rr, config.resample_hz)
            .map(|spectrum| band_powers(&spectrum))
            .unwrap_or_default();

        Self {
            samples: rr.len(),
            mean_rr: or_zero("mean", mean(rr)),
            sdnn: or_zero("sdnn", sdnn(rr)),
            sdsd: or_zero("sdsd", sdsd(rr)),
            rmssd: or_zero("rmssd", rmssd(rr)),
            sd1: or_zero("sd1", sd1(rr)),
            sd2: or_zero("sd2", sd2(rr)),
            heart_rate: or_zero("heart rate", heart_rate_from_last(rr)),
            apen: or_zero(
                "apen",
                tolerance.clone().and_then(|r| approximate_entropy(rr, m, r)),
            ),
            sampen: or_zero(
                "sampen",
                tolerance.and_then(|r| sample_entropy_ratio(rr, m, r)),
            ),
            d2: or_zero(
                "d2",
                correlation_dimension(&seconds, config.d2_embedding, &config.d2_sweep),
            ),
            vlf: bands.vlf,
            lf: bands.lf,
            hf: bands.hf,
            lf_hf: or_zero("lf/hf", bands.lf_hf_ratio()),
        }
    }

    pub fn to_json(&self) -> Result<String, crate::error::ComputeError> {
        Ok(serde_json::to_string(self)?)
    }
}
