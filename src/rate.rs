//! Event-rate counters
//!
//! Sensors report cumulative counters (wheel or crank revolutions, stride
//! pulses) rather than rates. These counters turn consecutive readings into
//! events per minute, tolerating wraparound of both the count and the
//! 16-bit event clock.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Event clock resolution of the BLE CSC profile
pub const DEFAULT_TICK_RATE_HZ: u32 = 1024;

/// Mask for 16-bit cumulative counts (crank revolutions)
pub const COUNT_WIDTH_U16: u32 = 0xFFFF;
/// Mask for 32-bit cumulative counts (wheel revolutions)
pub const COUNT_WIDTH_U32: u32 = u32::MAX;

/// Events-per-minute from a cumulative count and a wrapping 16-bit event time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadenceCounter {
    tick_rate_hz: u32,
    count_mask: u32,
    previous: Option<(u32, u16)>,
}

impl Default for CadenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CadenceCounter {
    /// 1024 Hz event clock, 16-bit counts
    pub fn new() -> Self {
        Self::with_tick_rate(DEFAULT_TICK_RATE_HZ)
    }

    pub fn with_tick_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            count_mask: COUNT_WIDTH_U16,
            previous: None,
        }
    }

    /// Set the wrap width of the cumulative count (`COUNT_WIDTH_U16` or `COUNT_WIDTH_U32`)
    pub fn with_count_mask(mut self, mask: u32) -> Self {
        self.count_mask = mask;
        self
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    pub fn ticks_per_minute(&self) -> f64 {
        f64::from(self.tick_rate_hz) * 60.0
    }

    /// Feed one reading; returns the rate since the previous reading.
    ///
    /// `None` on the first reading and when no clock time has elapsed. The
    /// stored reading is replaced either way.
    pub fn events_per_minute(&mut self, count: u32, time: u16) -> Option<f64> {
        let previous = self.previous.replace((count, time));
        let (previous_count, previous_time) = previous?;

        let delta_count = count.wrapping_sub(previous_count) & self.count_mask;
        let delta_time = time.wrapping_sub(previous_time);
        if delta_time == 0 {
            return None;
        }
        Some(f64::from(delta_count) * self.ticks_per_minute() / f64::from(delta_time))
    }

    /// Forget the previous reading (sensor reconnect)
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Cadence from an 8-bit stride-pulse counter sampled with arrival times.
///
/// Some Zephyr HxM firmware reports a broken stride-rate field; the stride
/// counter is still sound, so cadence is averaged over a short window of
/// distinct counter values instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrideCounter {
    window: usize,
    readings: VecDeque<(u8, i64)>,
}

impl Default for StrideCounter {
    fn default() -> Self {
        Self::new(10)
    }
}

impl StrideCounter {
    /// Window of at least two readings
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            window,
            readings: VecDeque::with_capacity(window),
        }
    }

    /// Record a stride count observed at `at_ms`; returns strides per minute
    /// across the window.
    pub fn update(&mut self, stride_count: u8, at_ms: i64) -> Option<f64> {
        if self.readings.back().map(|(c, _)| *c) != Some(stride_count) {
            self.readings.push_back((stride_count, at_ms));
            while self.readings.len() > self.window {
                self.readings.pop_front();
            }
        }
        self.rate()
    }

    fn rate(&self) -> Option<f64> {
        let (_, first_at) = *self.readings.front()?;
        let (_, last_at) = *self.readings.back()?;
        if self.readings.len() < 2 || last_at <= first_at {
            return None;
        }
        let strides: u32 = self
            .readings
            .iter()
            .zip(self.readings.iter().skip(1))
            .map(|((a, _), (b, _))| u32::from(b.wrapping_sub(*a)))
            .sum();
        Some(f64::from(strides) * 60_000.0 / (last_at - first_at) as f64)
    }

    pub fn reset(&mut self) {
        self.readings.clear();
    }
}
