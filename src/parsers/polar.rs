//! Polar Wearlink heart-rate monitor
//!
//! Packet layout (`FE 08 F7 06 F1 48 03 64`):
//!
//! | offset | field                                   |
//! |--------|-----------------------------------------|
//! | 0      | header, always `0xFE`                   |
//! | 1      | packet length (8, 10, 12, 14, rarely 16) |
//! | 2      | check byte, `0xFF - length`             |
//! | 3      | sequence, 0..=15                        |
//! | 4      | status                                  |
//! | 5      | battery / heart rate byte               |
//! | 6..    | RR intervals, u16 big-endian, ms        |

use super::FrameParser;
use crate::codec::{read_u16_be, read_u8};
use crate::config::SensorConfig;
use crate::error::DecodeError;
use crate::history::ParserState;
use crate::types::{TelemetryRecord, Vendor};

pub const POLAR_HEADER: u8 = 0xFE;
/// Buffer size that always holds one complete packet
pub const POLAR_FRAME_SIZE: usize = 16;

const MIN_PACKET_LEN: usize = 8;
const BATTERY_OFFSET: usize = 5;
const RR_OFFSET: usize = 6;

#[derive(Debug, Clone)]
pub struct PolarParser {
    config: SensorConfig,
    state: ParserState,
}

impl PolarParser {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            config: config.clone(),
            state: ParserState::with_rr_capacity(config.rr_capacity),
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// Header, check byte and sequence of the packet at the start of `packet`
    fn check_header(packet: &[u8]) -> Result<usize, DecodeError> {
        if packet.len() < 4 {
            return Err(DecodeError::Truncated {
                needed: MIN_PACKET_LEN,
                actual: packet.len(),
            });
        }
        if packet[0] != POLAR_HEADER {
            return Err(DecodeError::BadSync { offset: 0 });
        }
        let length = packet[1];
        let expected = 0xFF - length;
        if packet[2] != expected {
            return Err(DecodeError::BadChecksum {
                expected,
                found: packet[2],
            });
        }
        if packet[3] >= 16 {
            return Err(DecodeError::BadSequence(packet[3]));
        }
        Ok(usize::from(length))
    }
}

impl FrameParser for PolarParser {
    fn vendor(&self) -> Vendor {
        Vendor::Polar
    }

    fn frame_size(&self) -> usize {
        POLAR_FRAME_SIZE
    }

    fn find_alignment(&self, buffer: &[u8]) -> Option<usize> {
        // the shortest packet is 8 bytes
        (0..buffer.len().saturating_sub(MIN_PACKET_LEN)).find(|&i| self.is_valid(buffer, i))
    }

    fn is_valid(&self, buffer: &[u8], offset: usize) -> bool {
        buffer
            .get(offset..)
            .map_or(false, |packet| Self::check_header(packet).is_ok())
    }

    fn decode(&mut self, buffer: &[u8]) -> Result<TelemetryRecord, DecodeError> {
        let length = Self::check_header(buffer)?;
        if length < MIN_PACKET_LEN || length % 2 != 0 {
            return Err(DecodeError::BadLength(length));
        }
        if length > buffer.len() {
            return Err(DecodeError::Truncated {
                needed: length,
                actual: buffer.len(),
            });
        }

        let intervals: Vec<u16> = (RR_OFFSET..length)
            .step_by(2)
            .filter_map(|i| read_u16_be(buffer, i))
            .collect();

        // one implausible interval discards the whole packet
        if let Some(bad) = intervals
            .iter()
            .find(|rr| !self.config.rr_in_range(i64::from(**rr)))
        {
            return Err(DecodeError::OutOfRange {
                what: "rr interval",
                value: i64::from(*bad),
            });
        }

        let battery = read_u8(buffer, BATTERY_OFFSET).ok_or(DecodeError::Truncated {
            needed: BATTERY_OFFSET + 1,
            actual: buffer.len(),
        })?;
        let first = *intervals.first().ok_or(DecodeError::BadLength(length))?;

        for rr in &intervals {
            self.state.rr.push(f64::from(*rr));
        }
        log::trace!("polar rr={:?} battery={}", intervals, battery);

        let mut builder = TelemetryRecord::builder(Vendor::Polar)
            .heart_rate(i32::from(first))
            .bpm((60_000.0 / f64::from(first)).round() as i32)
            .battery_level(i32::from(battery));
        if let Some(rc1) = intervals.get(1) {
            builder = builder.heart_rate_rc1(i32::from(*rc1));
        }
        if let Some(rc2) = intervals.get(2) {
            builder = builder.heart_rate_rc2(i32::from(*rc2));
        }
        if let Some(rmssd) = self.state.rounded_rmssd() {
            builder = builder.rmssd(rmssd);
        }
        Ok(builder.build())
    }

    fn frame_len(&self, buffer: &[u8]) -> usize {
        read_u8(buffer, 1)
            .map(usize::from)
            .filter(|len| *len >= MIN_PACKET_LEN)
            .unwrap_or(MIN_PACKET_LEN)
    }

    fn rr_snapshot(&self) -> Vec<f64> {
        self.state.rr.snapshot()
    }

    fn reset(&mut self) {
        self.state.reset();
    }
}
