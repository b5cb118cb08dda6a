//! Per-connection parser state
//!
//! Each parser owns one [`ParserState`]: the last good scalar it decoded and a
//! bounded, time-ordered window of RR intervals for the statistics engine.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of RR samples kept per connection
pub const DEFAULT_RR_CAPACITY: usize = 512;

/// Bounded RR-interval window (ms), oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Default for RrHistory {
    fn default() -> Self {
        Self::new(DEFAULT_RR_CAPACITY)
    }
}

impl RrHistory {
    /// Create a window holding at most `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once full
    pub fn push(&mut self, rr_ms: f64) {
        self.samples.push_back(rr_ms);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Contiguous view in temporal order, for handing to `stats`
    pub fn as_slice(&mut self) -> &[f64] {
        self.samples.make_contiguous()
    }

    /// Owned copy for callers that compute off the decode path
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Mutable state a parser carries across frames of one connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParserState {
    /// Recent RR intervals; the newest one is the last good reading
    pub rr: RrHistory,
}

impl ParserState {
    pub fn with_rr_capacity(capacity: usize) -> Self {
        Self {
            rr: RrHistory::new(capacity),
        }
    }

    /// Drop everything learned from the previous connection
    pub fn reset(&mut self) {
        self.rr.clear();
    }

    /// RMSSD of the current window rounded to whole ms, when defined and positive
    pub fn rounded_rmssd(&mut self) -> Option<i32> {
        crate::stats::rmssd(self.rr.as_slice())
            .ok()
            .map(|v| v.round() as i32)
            .filter(|v| *v > 0)
    }
}
