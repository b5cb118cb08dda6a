//! Vendor frame parsers
//!
//! Each parser validates and decodes one vendor's framing into a
//! [`TelemetryRecord`]. Serial-stream parsers (Polar, Zephyr, NeuroSky) also
//! know how to find frame boundaries in a desynchronized byte stream; BLE
//! parsers receive one complete characteristic value per call.

mod ble_csc;
mod ble_hrm;
mod neurosky;
mod polar;
mod zephyr;

pub use ble_csc::BleCscParser;
pub use ble_hrm::BleHrmParser;
pub use neurosky::NeuroskyParser;
pub use polar::PolarParser;
pub use zephyr::ZephyrParser;

use crate::config::SensorConfig;
use crate::error::DecodeError;
use crate::types::{TelemetryRecord, Vendor};

/// Common validate / align / decode contract
pub trait FrameParser {
    /// Protocol handled by this parser
    fn vendor(&self) -> Vendor;

    /// Minimum buffer length that guarantees one complete frame
    fn frame_size(&self) -> usize;

    /// First offset where a structurally valid frame could start
    fn find_alignment(&self, buffer: &[u8]) -> Option<usize>;

    /// Structural validation of the frame at `offset`; false on short buffers
    fn is_valid(&self, buffer: &[u8], offset: usize) -> bool;

    /// Decode the frame at offset 0, updating per-connection state
    fn decode(&mut self, buffer: &[u8]) -> Result<TelemetryRecord, DecodeError>;

    /// [`decode`](Self::decode) with the failure reason logged and dropped
    fn parse(&mut self, buffer: &[u8]) -> Option<TelemetryRecord> {
        match self.decode(buffer) {
            Ok(record) => Some(record),
            Err(e) => {
                log::debug!("{} frame rejected: {}", self.vendor(), e);
                None
            }
        }
    }

    /// Bytes occupied by the frame at offset 0
    fn frame_len(&self, _buffer: &[u8]) -> usize {
        self.frame_size()
    }

    /// RR intervals (ms) collected on this connection, oldest first
    fn rr_snapshot(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Forget everything learned from the current connection
    fn reset(&mut self);
}

/// Closed set of supported parsers
#[derive(Debug, Clone)]
pub enum SensorParser {
    Polar(PolarParser),
    Zephyr(ZephyrParser),
    Neurosky(NeuroskyParser),
    BleHrm(BleHrmParser),
    BleCsc(BleCscParser),
}

impl SensorParser {
    /// Fresh parser for one connection to a `vendor` sensor
    pub fn new(vendor: Vendor, config: &SensorConfig) -> Self {
        match vendor {
            Vendor::Polar => SensorParser::Polar(PolarParser::new(config)),
            Vendor::Zephyr => SensorParser::Zephyr(ZephyrParser::new(config)),
            Vendor::Neurosky => SensorParser::Neurosky(NeuroskyParser::new()),
            Vendor::BleHrm => SensorParser::BleHrm(BleHrmParser::new(config)),
            Vendor::BleCsc => SensorParser::BleCsc(BleCscParser::new(config)),
        }
    }

    fn inner(&self) -> &dyn FrameParser {
        match self {
            SensorParser::Polar(p) => p,
            SensorParser::Zephyr(p) => p,
            SensorParser::Neurosky(p) => p,
            SensorParser::BleHrm(p) => p,
            SensorParser::BleCsc(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn FrameParser {
        match self {
            SensorParser::Polar(p) => p,
            SensorParser::Zephyr(p) => p,
            SensorParser::Neurosky(p) => p,
            SensorParser::BleHrm(p) => p,
            SensorParser::BleCsc(p) => p,
        }
    }
}

impl FrameParser for SensorParser {
    fn vendor(&self) -> Vendor {
        match self {
            SensorParser::Polar(_) => Vendor::Polar,
            SensorParser::Zephyr(_) => Vendor::Zephyr,
            SensorParser::Neurosky(_) => Vendor::Neurosky,
            SensorParser::BleHrm(_) => Vendor::BleHrm,
            SensorParser::BleCsc(_) => Vendor::BleCsc,
        }
    }

    fn frame_size(&self) -> usize {
        self.inner().frame_size()
    }

    fn find_alignment(&self, buffer: &[u8]) -> Option<usize> {
        self.inner().find_alignment(buffer)
    }

    fn is_valid(&self, buffer: &[u8], offset: usize) -> bool {
        self.inner().is_valid(buffer, offset)
    }

    fn decode(&mut self, buffer: &[u8]) -> Result<TelemetryRecord, DecodeError> {
        self.inner_mut().decode(buffer)
    }

    fn frame_len(&self, buffer: &[u8]) -> usize {
        self.inner().frame_len(buffer)
    }

    fn rr_snapshot(&self) -> Vec<f64> {
        self.inner().rr_snapshot()
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }
}
