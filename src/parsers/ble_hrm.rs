//! Bluetooth LE Heart Rate Measurement characteristic (0x2A37)

use super::FrameParser;
use crate::codec::{read_u16_le, read_u8};
use crate::config::SensorConfig;
use crate::error::DecodeError;
use crate::history::ParserState;
use crate::types::{TelemetryRecord, Vendor};

/// Heart rate value is UINT16 rather than UINT8
pub const FLAG_HR_UINT16: u8 = 0x01;
/// Energy expended field present
pub const FLAG_ENERGY_EXPENDED: u8 = 0x08;
/// One or more RR intervals present
pub const FLAG_RR_INTERVALS: u8 = 0x10;

/// Flags byte plus an 8-bit heart rate
const MIN_PAYLOAD_LEN: usize = 2;

/// RR intervals are transmitted in 1/1024 s
fn rr_to_ms(raw: u16) -> i64 {
    (f64::from(raw) * 1000.0 / 1024.0).round() as i64
}

#[derive(Debug, Clone)]
pub struct BleHrmParser {
    config: SensorConfig,
    state: ParserState,
}

/// Heart rate and the offset just past the optional energy field
fn read_header(payload: &[u8]) -> Result<(u8, u16, usize), DecodeError> {
    let truncated = |needed: usize| DecodeError::Truncated {
        needed,
        actual: payload.len(),
    };
    let flags = read_u8(payload, 0).ok_or(truncated(MIN_PAYLOAD_LEN))?;
    let (heart_rate, mut offset) = if flags & FLAG_HR_UINT16 != 0 {
        (read_u16_le(payload, 1).ok_or(truncated(3))?, 3)
    } else {
        (u16::from(read_u8(payload, 1).ok_or(truncated(2))?), 2)
    };
    if flags & FLAG_ENERGY_EXPENDED != 0 {
        offset += 2;
        if payload.len() < offset {
            return Err(truncated(offset));
        }
    }
    Ok((flags, heart_rate, offset))
}

impl BleHrmParser {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            config: config.clone(),
            state: ParserState::with_rr_capacity(config.rr_capacity),
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }
}

impl FrameParser for BleHrmParser {
    fn vendor(&self) -> Vendor {
        Vendor::BleHrm
    }

    fn frame_size(&self) -> usize {
        MIN_PAYLOAD_LEN
    }

    /// Characteristic values arrive whole
    fn find_alignment(&self, buffer: &[u8]) -> Option<usize> {
        (!buffer.is_empty()).then_some(0)
    }

    fn is_valid(&self, buffer: &[u8], offset: usize) -> bool {
        buffer
            .get(offset..)
            .map_or(false, |payload| read_header(payload).is_ok())
    }

    fn decode(&mut self, buffer: &[u8]) -> Result<TelemetryRecord, DecodeError> {
        let (flags, heart_rate, offset) = read_header(buffer)?;

        let mut intervals = Vec::new();
        if flags & FLAG_RR_INTERVALS != 0 {
            let count = (buffer.len() - offset) / 2;
            for i in 0..count {
                let raw = read_u16_le(buffer, offset + 2 * i).ok_or(DecodeError::Truncated {
                    needed: offset + 2 * i + 2,
                    actual: buffer.len(),
                })?;
                let ms = rr_to_ms(raw);
                // one implausible interval discards the whole update
                if !self.config.rr_in_range(ms) {
                    return Err(DecodeError::OutOfRange {
                        what: "rr interval",
                        value: ms,
                    });
                }
                intervals.push(ms);
            }
        }

        for ms in &intervals {
            self.state.rr.push(*ms as f64);
        }
        log::trace!("ble hrm flags={:#04x} hr={} rr={:?}", flags, heart_rate, intervals);

        let mut builder = TelemetryRecord::builder(Vendor::BleHrm)
            .heart_rate(i32::from(heart_rate))
            .bpm(i32::from(heart_rate));
        if let Some(rmssd) = self.state.rounded_rmssd() {
            builder = builder.rmssd(rmssd);
        }
        Ok(builder.build())
    }

    fn frame_len(&self, buffer: &[u8]) -> usize {
        buffer.len()
    }

    fn rr_snapshot(&self) -> Vec<f64> {
        self.state.rr.snapshot()
    }

    fn reset(&mut self) {
        self.state.reset();
    }
}
