//! Ordinary least-squares line fit

use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Fitted line `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient (0 when `y` is constant)
    pub correlation: f64,
}

/// Least-squares slope, intercept and correlation over paired samples.
///
/// Rejects mismatched lengths, fewer than two points and a constant `x`
/// (the slope would be undefined).
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<Regression, StatsError> {
    if x.len() != y.len() {
        return Err(StatsError::LengthMismatch(x.len(), y.len()));
    }
    let n = x.len();
    if n < 2 {
        return Err(StatsError::InsufficientSamples {
            needed: 2,
            actual: n,
        });
    }

    let x_mean = x.iter().sum::<f64>() / n as f64;
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx == 0.0 {
        return Err(StatsError::ZeroVariance("regression x"));
    }

    let slope = sxy / sxx;
    let correlation = if syy == 0.0 {
        0.0
    } else {
        sxy / (sxx * syy).sqrt()
    };

    Ok(Regression {
        slope,
        intercept: y_mean - slope * x_mean,
        correlation,
    })
}
