//! NeuroSky ThinkGear headset (eSense attention / meditation)
//!
//! Packets start with the sync pair `AA AA`. When the byte five past a sync
//! pair is zero, the two bytes after it carry attention and meditation.
//! Readings outside `(0, 100)` are noise; the last good value is reported
//! instead.

use super::FrameParser;
use crate::error::DecodeError;
use crate::types::{TelemetryRecord, Vendor};

pub const NEUROSKY_SYNC: u8 = 0xAA;
pub const NEUROSKY_FRAME_SIZE: usize = 170;

const MARKER_OFFSET: usize = 5;
const ATTENTION_OFFSET: usize = 6;
const MEDITATION_OFFSET: usize = 7;
const SCAN_MARGIN: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct NeuroskyParser {
    attention: Option<i32>,
    meditation: Option<i32>,
}

fn accept(value: u8) -> Option<i32> {
    (1..100).contains(&value).then(|| i32::from(value))
}

impl NeuroskyParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last accepted attention value
    pub fn attention(&self) -> Option<i32> {
        self.attention
    }

    /// Last accepted meditation value
    pub fn meditation(&self) -> Option<i32> {
        self.meditation
    }

    fn is_sync(buffer: &[u8], i: usize) -> bool {
        buffer.get(i..).map_or(false, |rest| rest.starts_with(&[NEUROSKY_SYNC, NEUROSKY_SYNC]))
    }

    /// Raw (attention, meditation) from the last eSense packet in `buffer`
    fn scan(buffer: &[u8]) -> Option<(u8, u8)> {
        (0..buffer.len().saturating_sub(SCAN_MARGIN))
            .filter(|&i| Self::is_sync(buffer, i) && buffer[i + MARKER_OFFSET] == 0)
            .map(|i| (buffer[i + ATTENTION_OFFSET], buffer[i + MEDITATION_OFFSET]))
            .last()
    }
}

impl FrameParser for NeuroskyParser {
    fn vendor(&self) -> Vendor {
        Vendor::Neurosky
    }

    fn frame_size(&self) -> usize {
        NEUROSKY_FRAME_SIZE
    }

    fn find_alignment(&self, buffer: &[u8]) -> Option<usize> {
        buffer
            .windows(2)
            .position(|w| w == [NEUROSKY_SYNC, NEUROSKY_SYNC])
    }

    fn is_valid(&self, buffer: &[u8], offset: usize) -> bool {
        Self::is_sync(buffer, offset)
    }

    fn decode(&mut self, buffer: &[u8]) -> Result<TelemetryRecord, DecodeError> {
        if buffer.len() < 2 {
            return Err(DecodeError::Truncated {
                needed: 2,
                actual: buffer.len(),
            });
        }
        if !Self::is_sync(buffer, 0) {
            return Err(DecodeError::BadSync { offset: 0 });
        }

        // only the frame at offset 0; later frames get their own decode
        let frame = &buffer[..NEUROSKY_FRAME_SIZE.min(buffer.len())];
        let (attention, meditation) = Self::scan(frame).unwrap_or((0, 0));
        match accept(attention) {
            Some(value) => self.attention = Some(value),
            None => log::debug!("neurosky attention {} rejected", attention),
        }
        match accept(meditation) {
            Some(value) => self.meditation = Some(value),
            None => log::debug!("neurosky meditation {} rejected", meditation),
        }

        Ok(TelemetryRecord::builder(Vendor::Neurosky)
            .attention(self.attention.unwrap_or(0))
            .meditation(self.meditation.unwrap_or(0))
            .build())
    }

    fn reset(&mut self) {
        self.attention = None;
        self.meditation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(attention: u8, meditation: u8) -> Vec<u8> {
        let mut buffer = vec![0xAA, 0xAA, 0x04, 0x80, 0x02, 0x00, attention, meditation];
        buffer.extend_from_slice(&[0x01; 12]);
        buffer
    }

    fn value(reading: Option<crate::types::SensorReading>) -> Option<i32> {
        reading.and_then(|r| r.value())
    }

    #[test]
    fn test_decode_esense_values() {
        let mut parser = NeuroskyParser::new();
        let record = parser.decode(&packet(55, 61)).unwrap();
        assert_eq!(value(record.attention), Some(55));
        assert_eq!(value(record.meditation), Some(61));
        assert_eq!(record.battery_level, None);
    }

    #[test]
    fn test_invalid_value_keeps_last_good() {
        let mut parser = NeuroskyParser::new();
        parser.decode(&packet(40, 50)).unwrap();
        for _ in 0..2 {
            let record = parser.decode(&packet(150, 50)).unwrap();
            assert_eq!(value(record.attention), Some(40));
        }
        assert_eq!(parser.attention(), Some(40));
    }

    #[test]
    fn test_no_good_value_yet_reports_zero() {
        let mut parser = NeuroskyParser::new();
        let record = parser.decode(&packet(100, 0)).unwrap();
        assert_eq!(value(record.attention), Some(0));
        assert_eq!(value(record.meditation), Some(0));
    }

    #[test]
    fn test_last_packet_wins() {
        let mut parser = NeuroskyParser::new();
        let mut buffer = packet(20, 30);
        buffer.extend(packet(70, 80));
        let record = parser.decode(&buffer).unwrap();
        assert_eq!(value(record.attention), Some(70));
        assert_eq!(value(record.meditation), Some(80));
    }

    #[test]
    fn test_scan_stops_at_frame_end() {
        let mut parser = NeuroskyParser::new();
        let mut buffer = packet(20, 30);
        buffer.resize(NEUROSKY_FRAME_SIZE, 0x01);
        buffer.extend(packet(70, 80));
        let record = parser.decode(&buffer).unwrap();
        assert_eq!(value(record.attention), Some(20));
        assert_eq!(value(record.meditation), Some(30));
    }

    #[test]
    fn test_requires_sync_at_start() {
        let mut parser = NeuroskyParser::new();
        let mut buffer = vec![0x00];
        buffer.extend(packet(20, 30));
        assert_eq!(parser.decode(&buffer), Err(DecodeError::BadSync { offset: 0 }));
        assert_eq!(parser.find_alignment(&buffer), Some(1));
        assert!(parser.is_valid(&buffer, 1));
        assert!(!parser.is_valid(&buffer, 0));
        assert!(!parser.is_valid(&buffer, 500));
    }

    #[test]
    fn test_reset_forgets_values() {
        let mut parser = NeuroskyParser::new();
        parser.decode(&packet(40, 50)).unwrap();
        parser.reset();
        assert_eq!(parser.attention(), None);
        assert_eq!(parser.meditation(), None);
    }
}
