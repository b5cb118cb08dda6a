//! Frequency-domain HRV
//!
//! RR intervals are unevenly spaced in time, so the tachogram is first
//! resampled onto a uniform grid by linear interpolation before the FFT.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Upper edge of the very-low-frequency band (Hz, inclusive)
pub const VLF_MAX_HZ: f64 = 0.04;
/// Upper edge of the low-frequency band (Hz, inclusive)
pub const LF_MAX_HZ: f64 = 0.15;
/// Upper edge of the high-frequency band (Hz, inclusive)
pub const HF_MAX_HZ: f64 = 0.4;

/// Default tachogram resampling rate
pub const DEFAULT_RESAMPLE_HZ: f64 = 4.0;

/// Longest resampled tachogram accepted (about 72 h at 4 Hz)
pub const MAX_RESAMPLED_LEN: usize = 1 << 20;

/// Summed spectral power per HRV band
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowers {
    pub vlf: f64,
    pub lf: f64,
    pub hf: f64,
}

impl BandPowers {
    pub fn total(&self) -> f64 {
        self.vlf + self.lf + self.hf
    }

    /// LF/HF balance; undefined without HF power
    pub fn lf_hf_ratio(&self) -> Result<f64, StatsError> {
        if self.hf > 0.0 {
            Ok(self.lf / self.hf)
        } else {
            Err(StatsError::ZeroDenominator("lf/hf ratio"))
        }
    }
}

/// Sum `(frequency, power)` pairs into VLF `<= 0.04`, LF `(0.04, 0.15]` and
/// HF `(0.15, 0.4]`. Power above 0.4 Hz is ignored.
pub fn band_powers(spectrum: &[(f64, f64)]) -> BandPowers {
    spectrum
        .iter()
        .fold(BandPowers::default(), |mut bands, &(freq, power)| {
            if freq <= VLF_MAX_HZ {
                bands.vlf += power;
            } else if freq <= LF_MAX_HZ {
                bands.lf += power;
            } else if freq <= HF_MAX_HZ {
                bands.hf += power;
            }
            bands
        })
}

/// Evenly resampled tachogram (ms) starting at the first beat
fn resample(rr: &[f64], resample_hz: f64) -> Result<Vec<f64>, StatsError> {
    let mut times = Vec::with_capacity(rr.len());
    let mut elapsed = 0.0;
    for (i, interval) in rr.iter().enumerate() {
        if i > 0 {
            elapsed += interval / 1000.0;
        }
        times.push(elapsed);
    }

    let span = (elapsed * resample_hz).floor();
    if !span.is_finite() || span >= MAX_RESAMPLED_LEN as f64 {
        return Err(StatsError::TooManySamples {
            limit: MAX_RESAMPLED_LEN,
        });
    }
    let count = span as usize + 1;
    let mut out = Vec::with_capacity(count);
    let mut segment = 0;
    for k in 0..count {
        let t = k as f64 / resample_hz;
        while segment + 2 < times.len() && times[segment + 1] < t {
            segment += 1;
        }
        let (t0, t1) = (times[segment], times[segment + 1]);
        let (v0, v1) = (rr[segment], rr[segment + 1]);
        let frac = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
        out.push(v0 + (v1 - v0) * frac.clamp(0.0, 1.0));
    }
    Ok(out)
}

fn hann_window(size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
        })
        .collect()
}

/// One-sided power spectrum of an RR series.
///
/// Returns `(frequency_hz, power)` pairs where each power is the bin's share
/// of the variance (ms²), so summing a band gives its absolute power.
pub fn periodogram(rr: &[f64], resample_hz: f64) -> Result<Vec<(f64, f64)>, StatsError> {
    if rr.len() < 3 {
        return Err(StatsError::InsufficientSamples {
            needed: 3,
            actual: rr.len(),
        });
    }
    if !(resample_hz > 0.0) {
        return Err(StatsError::ZeroDenominator("resample rate"));
    }
    if rr.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(StatsError::InvalidInput("periodogram"));
    }

    let samples = resample(rr, resample_hz)?;
    let n = samples.len();
    if n < 4 {
        return Err(StatsError::InsufficientSamples {
            needed: 4,
            actual: n,
        });
    }

    let avg = samples.iter().sum::<f64>() / n as f64;
    let window = hann_window(n);
    let window_energy: f64 = window.iter().map(|w| w * w).sum();

    let mut buffer: Vec<Complex<f64>> = samples
        .iter()
        .zip(&window)
        .map(|(s, w)| Complex::new((s - avg) * w, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let resolution = resample_hz / n as f64;
    let psd_scale = 1.0 / (resample_hz * window_energy);
    let nyquist = n / 2;

    Ok(buffer[..=nyquist]
        .iter()
        .enumerate()
        .map(|(k, c)| {
            let mut psd = c.norm_sqr() * psd_scale;
            if k != 0 && !(n % 2 == 0 && k == nyquist) {
                psd *= 2.0;
            }
            (k as f64 * resolution, psd * resolution)
        })
        .collect())
}
