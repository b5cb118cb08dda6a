//! Descriptive statistics over numeric sequences

use crate::error::StatsError;

/// Sum of all values (0 for an empty slice)
pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::InsufficientSamples {
            needed: 1,
            actual: 0,
        });
    }
    Ok(sum(values) / values.len() as f64)
}

/// Sample variance (Bessel-corrected, divisor n-1)
pub fn variance(values: &[f64]) -> Result<f64, StatsError> {
    if values.len() < 2 {
        return Err(StatsError::InsufficientSamples {
            needed: 2,
            actual: values.len(),
        });
    }
    let avg = mean(values)?;
    let squares: f64 = values.iter().map(|v| (v - avg).powi(2)).sum();
    Ok(squares / (values.len() - 1) as f64)
}

/// Sample standard deviation
pub fn std_dev(values: &[f64]) -> Result<f64, StatsError> {
    variance(values).map(f64::sqrt)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Index of the first largest value
pub fn index_of_max(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, current)) if v <= current => {}
            _ if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the first smallest value
pub fn index_of_min(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, current)) if v >= current => {}
            _ if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// First differences `values[i] - values[i + 1]`
pub fn successive_diffs(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[0] - w[1]).collect()
}

/// Absolute first differences `|values[i] - values[i + 1]|`
pub fn abs_successive_diffs(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| (w[0] - w[1]).abs()).collect()
}
