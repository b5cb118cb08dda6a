//! Zephyr HxM heart-rate and stride monitor
//!
//! Fixed 60-byte frames delimited by STX (`0x02`) and ETX (`0x03`), with a
//! CRC8 over the payload bytes `3..58` stored at byte 58.

use super::FrameParser;
use crate::codec::{crc8, read_u16_le};
use crate::config::SensorConfig;
use crate::error::DecodeError;
use crate::history::ParserState;
use crate::rate::StrideCounter;
use crate::types::{TelemetryRecord, Vendor};

pub const ZEPHYR_FRAME_SIZE: usize = 60;
pub const ZEPHYR_STX: u8 = 0x02;
pub const ZEPHYR_ETX: u8 = 0x03;

const CRC_OFFSET: usize = 58;
const ETX_OFFSET: usize = 59;
const PAYLOAD_START: usize = 3;
const FIRMWARE_ID: std::ops::Range<usize> = 3..11;
const BATTERY_OFFSET: usize = 11;
const HEART_RATE_OFFSET: usize = 12;
const HEARTBEAT_NUMBER_OFFSET: usize = 14;
/// 15 heartbeat timestamps, u16 LE ms, newest first
const TIMESTAMPS_OFFSET: usize = 15;
const TIMESTAMP_COUNT: usize = 15;
const STRIDES_OFFSET: usize = 54;
const STRIDE_RATE_OFFSET: usize = 56;

/// Firmware / hardware id whose stride-rate field is unusable
pub const CADENCE_BUG_FW_ID: [u8; 8] = [0x1A, 0x00, 0x31, 0x65, 0x50, 0x00, 0x31, 0x62];

#[derive(Debug, Clone)]
pub struct ZephyrParser {
    config: SensorConfig,
    state: ParserState,
    strides: StrideCounter,
    last_beat: Option<u8>,
}

impl ZephyrParser {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            config: config.clone(),
            state: ParserState::with_rr_capacity(config.rr_capacity),
            strides: StrideCounter::new(config.stride_window),
            last_beat: None,
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    fn check_frame(frame: &[u8]) -> Result<(), DecodeError> {
        if frame.len() < ZEPHYR_FRAME_SIZE {
            return Err(DecodeError::Truncated {
                needed: ZEPHYR_FRAME_SIZE,
                actual: frame.len(),
            });
        }
        if frame[0] != ZEPHYR_STX {
            return Err(DecodeError::BadSync { offset: 0 });
        }
        if frame[ETX_OFFSET] != ZEPHYR_ETX {
            return Err(DecodeError::BadSync { offset: ETX_OFFSET });
        }
        let expected = crc8(&frame[PAYLOAD_START..CRC_OFFSET]);
        if frame[CRC_OFFSET] != expected {
            return Err(DecodeError::BadChecksum {
                expected,
                found: frame[CRC_OFFSET],
            });
        }
        Ok(())
    }

    /// Push the intervals of every heartbeat since the previous frame
    fn collect_intervals(&mut self, frame: &[u8]) {
        let beat = frame[HEARTBEAT_NUMBER_OFFSET];
        let new_beats = match self.last_beat {
            Some(previous) => usize::from(beat.wrapping_sub(previous)),
            None => 1,
        };
        self.last_beat = Some(beat);

        let timestamps: Vec<u16> = (0..TIMESTAMP_COUNT)
            .filter_map(|k| read_u16_le(frame, TIMESTAMPS_OFFSET + 2 * k))
            .collect();

        // oldest first, so the history stays in temporal order
        for k in (0..new_beats.min(TIMESTAMP_COUNT - 1)).rev() {
            let interval = timestamps[k].wrapping_sub(timestamps[k + 1]);
            if self.config.rr_in_range(i64::from(interval)) {
                self.state.rr.push(f64::from(interval));
            } else {
                log::debug!("zephyr rr interval {} ms dropped", interval);
            }
        }
    }

    fn cadence(&mut self, frame: &[u8], at_ms: i64) -> Option<i32> {
        if frame[FIRMWARE_ID] == CADENCE_BUG_FW_ID {
            self.strides
                .update(frame[STRIDES_OFFSET], at_ms)
                .map(|spm| spm.round() as i32)
        } else {
            read_u16_le(frame, STRIDE_RATE_OFFSET).map(|rate| i32::from(rate / 16))
        }
    }
}

impl FrameParser for ZephyrParser {
    fn vendor(&self) -> Vendor {
        Vendor::Zephyr
    }

    fn frame_size(&self) -> usize {
        ZEPHYR_FRAME_SIZE
    }

    fn find_alignment(&self, buffer: &[u8]) -> Option<usize> {
        if buffer.first() == Some(&ZEPHYR_STX) {
            return Some(0);
        }
        buffer
            .windows(2)
            .position(|w| w == [ZEPHYR_ETX, ZEPHYR_STX])
            .map(|i| i + 1)
    }

    fn is_valid(&self, buffer: &[u8], offset: usize) -> bool {
        buffer
            .get(offset..)
            .map_or(false, |frame| Self::check_frame(frame).is_ok())
    }

    fn decode(&mut self, buffer: &[u8]) -> Result<TelemetryRecord, DecodeError> {
        Self::check_frame(buffer)?;
        let frame = &buffer[..ZEPHYR_FRAME_SIZE];

        let heart_rate = i32::from(frame[HEART_RATE_OFFSET]);
        let battery = i32::from(frame[BATTERY_OFFSET]);
        self.collect_intervals(frame);

        let mut builder = TelemetryRecord::builder(Vendor::Zephyr)
            .heart_rate(heart_rate)
            .bpm(heart_rate)
            .battery_level(battery);
        let at_ms = builder.creation_time().timestamp_millis();
        if let Some(cadence) = self.cadence(frame, at_ms) {
            builder = builder.cadence(cadence);
        }
        if let Some(rmssd) = self.state.rounded_rmssd() {
            builder = builder.rmssd(rmssd);
        }
        log::trace!("zephyr hr={} battery={}", heart_rate, battery);
        Ok(builder.build())
    }

    fn rr_snapshot(&self) -> Vec<f64> {
        self.state.rr.snapshot()
    }

    fn reset(&mut self) {
        self.state.reset();
        self.strides.reset();
        self.last_beat = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(heart_rate: u8, beat: u8, timestamps: &[u16]) -> [u8; ZEPHYR_FRAME_SIZE] {
        let mut f = [0u8; ZEPHYR_FRAME_SIZE];
        f[0] = ZEPHYR_STX;
        f[1] = 0x26;
        f[2] = 55;
        f[3..11].copy_from_slice(&[0x1A, 0x00, 0x31, 0x65, 0x50, 0x00, 0x31, 0x63]);
        f[BATTERY_OFFSET] = 87;
        f[HEART_RATE_OFFSET] = heart_rate;
        f[HEARTBEAT_NUMBER_OFFSET] = beat;
        for (k, ts) in timestamps.iter().enumerate() {
            f[TIMESTAMPS_OFFSET + 2 * k..TIMESTAMPS_OFFSET + 2 * k + 2]
                .copy_from_slice(&ts.to_le_bytes());
        }
        // stride rate 0x0500 / 16 = 80
        f[STRIDE_RATE_OFFSET..STRIDE_RATE_OFFSET + 2].copy_from_slice(&0x0500u16.to_le_bytes());
        seal(&mut f);
        f
    }

    fn seal(f: &mut [u8; ZEPHYR_FRAME_SIZE]) {
        f[CRC_OFFSET] = crc8(&f[PAYLOAD_START..CRC_OFFSET]);
        f[ETX_OFFSET] = ZEPHYR_ETX;
    }

    fn parser() -> ZephyrParser {
        ZephyrParser::new(&SensorConfig::default())
    }

    #[test]
    fn test_decode_fields() {
        let mut parser = parser();
        let record = parser.decode(&frame(72, 1, &[5000, 4200])).unwrap();
        assert_eq!(record.heart_rate.and_then(|r| r.value()), Some(72));
        assert_eq!(record.bpm.and_then(|r| r.value()), Some(72));
        assert_eq!(record.battery_level.and_then(|r| r.value()), Some(87));
        assert_eq!(record.cadence.and_then(|r| r.value()), Some(80));
        assert_eq!(parser.rr_snapshot(), vec![800.0]);
    }

    #[test]
    fn test_rr_only_on_new_beats() {
        let mut parser = parser();
        parser.decode(&frame(72, 1, &[5000, 4200])).unwrap();
        // same heartbeat number: nothing new
        parser.decode(&frame(72, 1, &[5000, 4200])).unwrap();
        assert_eq!(parser.rr_snapshot(), vec![800.0]);

        // two beats later, both intervals arrive oldest first
        let record = parser.decode(&frame(70, 3, &[6650, 5820, 5000, 4200])).unwrap();
        assert_eq!(parser.rr_snapshot(), vec![800.0, 820.0, 830.0]);
        assert_eq!(record.rmssd.and_then(|r| r.value()), Some(16));
    }

    #[test]
    fn test_timestamp_wraparound() {
        let mut parser = parser();
        parser.decode(&frame(60, 9, &[400, 65036])).unwrap();
        assert_eq!(parser.rr_snapshot(), vec![900.0]);
    }

    #[test]
    fn test_implausible_interval_dropped_not_fatal() {
        let mut parser = parser();
        let record = parser.decode(&frame(72, 1, &[5000, 4900])).unwrap();
        assert_eq!(record.heart_rate.and_then(|r| r.value()), Some(72));
        assert!(parser.rr_snapshot().is_empty());
    }

    #[test]
    fn test_crc_detects_flipped_bit() {
        let parser = parser();
        let good = frame(72, 1, &[5000, 4200]);
        assert!(parser.is_valid(&good, 0));
        let mut bad = good;
        bad[20] ^= 0x04;
        assert!(!parser.is_valid(&bad, 0));
        assert!(matches!(
            ZephyrParser::check_frame(&bad),
            Err(DecodeError::BadChecksum { .. })
        ));
    }

    #[test]
    fn test_framing_bytes() {
        let parser = parser();
        let mut no_etx = frame(72, 1, &[5000, 4200]);
        no_etx[ETX_OFFSET] = 0x00;
        assert!(!parser.is_valid(&no_etx, 0));
        assert!(!parser.is_valid(&no_etx[..40], 0));
    }

    #[test]
    fn test_buggy_firmware_uses_stride_counter() {
        let mut parser = parser();
        let mut f = frame(72, 1, &[5000, 4200]);
        f[3..11].copy_from_slice(&CADENCE_BUG_FW_ID);
        f[STRIDES_OFFSET] = 10;
        seal(&mut f);
        let record = parser.decode(&f).unwrap();
        // the stride-rate field says 80, but a single stride reading has no rate yet
        assert_eq!(record.cadence, None);
    }

    #[test]
    fn test_alignment() {
        let parser = parser();
        let good = frame(72, 1, &[5000, 4200]);
        assert_eq!(parser.find_alignment(&good), Some(0));

        let mut stream = vec![0x11, 0x22, ZEPHYR_ETX];
        stream.extend_from_slice(&good);
        assert_eq!(parser.find_alignment(&stream), Some(3));
        assert_eq!(parser.find_alignment(&[0x11, 0x22, 0x33]), None);
    }

    #[test]
    fn test_reset_clears_beats() {
        let mut parser = parser();
        parser.decode(&frame(72, 1, &[5000, 4200])).unwrap();
        parser.reset();
        assert!(parser.rr_snapshot().is_empty());
        parser.decode(&frame(72, 1, &[5000, 4200])).unwrap();
        assert_eq!(parser.rr_snapshot(), vec![800.0]);
    }
}
