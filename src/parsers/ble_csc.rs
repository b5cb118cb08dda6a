//! Bluetooth LE Cycling Speed and Cadence measurement (0x2A5B)
//!
//! The characteristic carries cumulative wheel and crank revolution counts
//! with their last event times; rates come from the difference between
//! consecutive notifications.

use super::FrameParser;
use crate::codec::{read_u16_le, read_u32_le, read_u8};
use crate::config::SensorConfig;
use crate::error::DecodeError;
use crate::rate::{CadenceCounter, COUNT_WIDTH_U32};
use crate::types::{TelemetryRecord, Vendor};

pub const FLAG_WHEEL_REVOLUTIONS: u8 = 0x01;
pub const FLAG_CRANK_REVOLUTIONS: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CscMeasurement {
    wheel: Option<(u32, u16)>,
    crank: Option<(u16, u16)>,
}

fn read_measurement(payload: &[u8]) -> Result<CscMeasurement, DecodeError> {
    let truncated = |needed: usize| DecodeError::Truncated {
        needed,
        actual: payload.len(),
    };
    let flags = read_u8(payload, 0).ok_or(truncated(1))?;
    let mut offset = 1;

    let wheel = if flags & FLAG_WHEEL_REVOLUTIONS != 0 {
        let revolutions = read_u32_le(payload, offset).ok_or(truncated(offset + 6))?;
        let time = read_u16_le(payload, offset + 4).ok_or(truncated(offset + 6))?;
        offset += 6;
        Some((revolutions, time))
    } else {
        None
    };

    let crank = if flags & FLAG_CRANK_REVOLUTIONS != 0 {
        let revolutions = read_u16_le(payload, offset).ok_or(truncated(offset + 4))?;
        let time = read_u16_le(payload, offset + 2).ok_or(truncated(offset + 4))?;
        Some((revolutions, time))
    } else {
        None
    };

    Ok(CscMeasurement { wheel, crank })
}

#[derive(Debug, Clone)]
pub struct BleCscParser {
    wheel: CadenceCounter,
    crank: CadenceCounter,
    wheel_rpm: Option<f64>,
}

impl BleCscParser {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            wheel: CadenceCounter::with_tick_rate(config.csc_tick_rate_hz)
                .with_count_mask(COUNT_WIDTH_U32),
            crank: CadenceCounter::with_tick_rate(config.csc_tick_rate_hz),
            wheel_rpm: None,
        }
    }

    /// Wheel revolutions per minute from the latest notification
    pub fn wheel_rpm(&self) -> Option<f64> {
        self.wheel_rpm
    }
}

impl FrameParser for BleCscParser {
    fn vendor(&self) -> Vendor {
        Vendor::BleCsc
    }

    fn frame_size(&self) -> usize {
        1
    }

    fn find_alignment(&self, buffer: &[u8]) -> Option<usize> {
        (!buffer.is_empty()).then_some(0)
    }

    fn is_valid(&self, buffer: &[u8], offset: usize) -> bool {
        buffer
            .get(offset..)
            .map_or(false, |payload| read_measurement(payload).is_ok())
    }

    fn decode(&mut self, buffer: &[u8]) -> Result<TelemetryRecord, DecodeError> {
        let measurement = read_measurement(buffer)?;

        if let Some((revolutions, time)) = measurement.wheel {
            self.wheel_rpm = self.wheel.events_per_minute(revolutions, time);
        }
        let cadence = measurement
            .crank
            .and_then(|(revolutions, time)| {
                self.crank.events_per_minute(u32::from(revolutions), time)
            });
        log::trace!(
            "ble csc {:?} wheel_rpm={:?} cadence={:?}",
            measurement,
            self.wheel_rpm,
            cadence
        );

        let mut builder = TelemetryRecord::builder(Vendor::BleCsc);
        if let Some(rpm) = cadence {
            builder = builder.cadence(rpm.round() as i32);
        }
        Ok(builder.build())
    }

    fn frame_len(&self, buffer: &[u8]) -> usize {
        buffer.len()
    }

    fn reset(&mut self) {
        self.wheel.reset();
        self.crank.reset();
        self.wheel_rpm = None;
    }
}
