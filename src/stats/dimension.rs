//! Correlation dimension (D2)
//!
//! The series is embedded into overlapping `m`-dimensional vectors. For each
//! radius on a logarithmic sweep the correlation sum (fraction of vector pairs
//! within Euclidean distance `exp(x)`) is computed, and D2 is estimated as the
//! slope of `ln C(r)` against `ln r` over the steepest stretch of that curve.
//!
//! Radii are in the units of the input, so callers usually pass RR intervals
//! in seconds.

use serde::{Deserialize, Serialize};

use super::descriptive::{abs_successive_diffs, index_of_max, index_of_min};
use super::regression::linear_regression;
use crate::error::StatsError;

/// Log-radius axis for the D2 sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct D2Sweep {
    /// Starting log-radius; the first bin sits one `step` above it
    pub start: f64,
    pub step: f64,
    pub bins: usize,
}

impl Default for D2Sweep {
    fn default() -> Self {
        Self {
            start: -3.0,
            step: 0.03,
            bins: 100,
        }
    }
}

impl D2Sweep {
    /// Log-radius of every bin
    pub fn axis(&self) -> Vec<f64> {
        (1..=self.bins)
            .map(|i| self.start + self.step * i as f64)
            .collect()
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Sorted pairwise distances between all distinct embedded vectors
fn pair_distances(rr: &[f64], m: usize) -> Vec<f64> {
    let vectors: Vec<&[f64]> = rr.windows(m).collect();
    let mut distances = Vec::with_capacity(vectors.len() * vectors.len().saturating_sub(1) / 2);
    for (i, a) in vectors.iter().enumerate() {
        for b in &vectors[i + 1..] {
            distances.push(euclidean(a, b));
        }
    }
    distances.sort_by(f64::total_cmp);
    distances
}

/// Correlation sum `C(r)`: fraction of ordered vector pairs (self excluded)
/// closer than `radius`
pub fn correlation_sum(rr: &[f64], m: usize, radius: f64) -> Result<f64, StatsError> {
    check_embedding(rr, m)?;
    let distances = pair_distances(rr, m);
    Ok(fraction_within(&distances, radius))
}

fn fraction_within(sorted: &[f64], radius: f64) -> f64 {
    let within = sorted.partition_point(|d| *d <= radius);
    within as f64 / sorted.len() as f64
}

fn check_embedding(rr: &[f64], m: usize) -> Result<(), StatsError> {
    if m == 0 || rr.len() <= m {
        return Err(StatsError::InsufficientSamples {
            needed: m.max(1) + 1,
            actual: rr.len(),
        });
    }
    Ok(())
}

/// Correlation dimension estimate with embedding dimension `m`
pub fn correlation_dimension(rr: &[f64], m: usize, sweep: &D2Sweep) -> Result<f64, StatsError> {
    check_embedding(rr, m)?;
    let distances = pair_distances(rr, m);
    let x = sweep.axis();

    // empty correlation sums carry the previous log value forward
    let mut last = 0.0;
    let y: Vec<f64> = x
        .iter()
        .map(|lr| {
            let c = fraction_within(&distances, lr.exp());
            if c > 0.0 {
                last = c.ln();
            }
            last
        })
        .collect();

    let slopes = abs_successive_diffs(&y);
    let r_max = index_of_max(&slopes).unwrap_or(0);
    if r_max == 0 {
        return Err(StatsError::ZeroVariance("correlation dimension"));
    }
    let r_min = index_of_min(&abs_successive_diffs(&y[..r_max])).unwrap_or(0);
    if r_max - r_min < 2 {
        return Err(StatsError::InsufficientSamples {
            needed: 2,
            actual: r_max - r_min,
        });
    }

    log::trace!("d2 fit over bins {}..{}", r_min, r_max);
    Ok(linear_regression(&x[r_min..r_max], &y[r_min..r_max])?.slope)
}
