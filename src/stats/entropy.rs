//! Approximate and sample entropy
//!
//! Both estimators embed the series into overlapping templates of length `m`
//! and `m + 1` and count neighbours within Chebyshev distance `r`. Approximate
//! entropy counts each template as its own neighbour; sample entropy does not.

use crate::error::StatsError;

fn chebyshev(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn check_input(rr: &[f64], m: usize, r: f64) -> Result<(), StatsError> {
    if m == 0 {
        return Err(StatsError::InsufficientSamples {
            needed: 1,
            actual: 0,
        });
    }
    // two templates of length m + 1 are the least that can be compared
    if rr.len() < m + 2 {
        return Err(StatsError::InsufficientSamples {
            needed: m + 2,
            actual: rr.len(),
        });
    }
    if !(r >= 0.0) {
        return Err(StatsError::ZeroDenominator("negative tolerance"));
    }
    Ok(())
}

/// Neighbour counts within `r` for every length-`m` template
fn match_counts(rr: &[f64], m: usize, r: f64, include_self: bool) -> Vec<usize> {
    let templates: Vec<&[f64]> = rr.windows(m).collect();
    templates
        .iter()
        .enumerate()
        .map(|(i, a)| {
            templates
                .iter()
                .enumerate()
                .filter(|(j, b)| (include_self || i != *j) && chebyshev(a, b) <= r)
                .count()
        })
        .collect()
}

/// Φ(m): mean log fraction of templates matching each template (self included)
fn phi(rr: &[f64], m: usize, r: f64) -> Result<f64, StatsError> {
    let counts = match_counts(rr, m, r, true);
    let total = counts.len() as f64;
    let mut acc = 0.0;
    for count in counts {
        if count == 0 {
            return Err(StatsError::UndefinedLog("approximate entropy"));
        }
        acc += (count as f64 / total).ln();
    }
    Ok(acc / total)
}

/// Mean fraction of *other* templates matching each template
fn match_ratio(rr: &[f64], m: usize, r: f64) -> f64 {
    let counts = match_counts(rr, m, r, false);
    let templates = counts.len() as f64;
    let others = templates - 1.0;
    counts.iter().map(|&c| c as f64 / others).sum::<f64>() / templates
}

/// Approximate entropy: `Φ(m) - Φ(m + 1)`
pub fn approximate_entropy(rr: &[f64], m: usize, r: f64) -> Result<f64, StatsError> {
    check_input(rr, m, r)?;
    Ok(phi(rr, m, r)? - phi(rr, m + 1, r)?)
}

/// Sample-entropy log ratio: `ln(S(m) / S(m + 1))`, where `S` is the mean
/// fraction of matching templates excluding self-matches.
pub fn sample_entropy_ratio(rr: &[f64], m: usize, r: f64) -> Result<f64, StatsError> {
    check_input(rr, m, r)?;
    let longer = match_ratio(rr, m + 1, r);
    if longer == 0.0 {
        return Err(StatsError::ZeroDenominator("sample entropy"));
    }
    let shorter = match_ratio(rr, m, r);
    Ok((shorter / longer).ln())
}
