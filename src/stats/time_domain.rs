//! Time-domain and Poincaré HRV metrics

use super::descriptive::{mean, std_dev, successive_diffs};
use crate::error::StatsError;

/// Standard deviation of all RR intervals (SDNN)
pub fn sdnn(rr: &[f64]) -> Result<f64, StatsError> {
    std_dev(rr)
}

/// Standard deviation of successive differences
pub fn sdsd(rr: &[f64]) -> Result<f64, StatsError> {
    if rr.len() < 3 {
        return Err(StatsError::InsufficientSamples {
            needed: 3,
            actual: rr.len(),
        });
    }
    std_dev(&successive_diffs(rr))
}

/// Root mean square of successive differences
pub fn rmssd(rr: &[f64]) -> Result<f64, StatsError> {
    if rr.len() < 2 {
        return Err(StatsError::InsufficientSamples {
            needed: 2,
            actual: rr.len(),
        });
    }
    let squares: Vec<f64> = successive_diffs(rr).iter().map(|d| d * d).collect();
    mean(&squares).map(f64::sqrt)
}

/// Poincaré plot minor axis: `sqrt(0.5) * SDSD`
pub fn sd1(rr: &[f64]) -> Result<f64, StatsError> {
    Ok(0.5_f64.sqrt() * sdsd(rr)?)
}

/// Poincaré plot major axis: `sqrt(2 * SD^2 - 0.5 * SDSD^2)`
///
/// Sampling noise can push the radicand slightly below zero on near-constant
/// series; it is clamped at zero.
pub fn sd2(rr: &[f64]) -> Result<f64, StatsError> {
    let sd = std_dev(rr)?;
    let successive = sdsd(rr)?;
    Ok((2.0 * sd.powi(2) - 0.5 * successive.powi(2)).max(0.0).sqrt())
}

/// Instantaneous heart rate from the most recent interval (beats per minute)
pub fn heart_rate_from_last(rr: &[f64]) -> Result<f64, StatsError> {
    let last = rr.last().copied().ok_or(StatsError::InsufficientSamples {
        needed: 1,
        actual: 0,
    })?;
    if last == 0.0 {
        return Err(StatsError::ZeroDenominator("heart rate"));
    }
    Ok((60_000.0 / last).abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmssd_three_beats() {
        let value = rmssd(&[800.0, 820.0, 810.0]).unwrap();
        assert!((value - 250.0_f64.sqrt()).abs() < 1e-9);
        assert!((value - 15.81).abs() < 0.01);
    }

    #[test]
    fn test_rmssd_needs_two_samples() {
        assert!(rmssd(&[800.0]).is_err());
        assert!(rmssd(&[]).is_err());
    }

    #[test]
    fn test_sdsd_and_sd1() {
        // diffs: -20, 10, -10 -> mean -20/3
        let rr = [800.0, 820.0, 810.0, 820.0];
        let diffs = [-20.0, 10.0, -10.0];
        let expected = std_dev(&diffs).unwrap();
        assert!((sdsd(&rr).unwrap() - expected).abs() < 1e-12);
        assert!((sd1(&rr).unwrap() - expected * 0.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_sd2_matches_formula() {
        let rr = [812.0, 790.0, 845.0, 830.0, 801.0, 799.0, 860.0];
        let sd = std_dev(&rr).unwrap();
        let s = sdsd(&rr).unwrap();
        let expected = (2.0 * sd * sd - 0.5 * s * s).sqrt();
        assert!((sd2(&rr).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_constant_series_is_zero_not_nan() {
        let rr = [800.0; 6];
        assert_eq!(rmssd(&rr).unwrap(), 0.0);
        assert_eq!(sd1(&rr).unwrap(), 0.0);
        assert_eq!(sd2(&rr).unwrap(), 0.0);
    }

    #[test]
    fn test_heart_rate_from_last() {
        assert_eq!(heart_rate_from_last(&[1000.0, 750.0]).unwrap(), 80.0);
        assert_eq!(
            heart_rate_from_last(&[0.0]),
            Err(StatsError::ZeroDenominator("heart rate"))
        );
    }
}
