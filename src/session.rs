//! Per-connection sensor session
//!
//! A [`SensorSession`] owns the parser for one sensor connection. Classic
//! Bluetooth bytes are buffered and re-aligned until whole frames can be
//! decoded; BLE characteristic values are decoded as they arrive. Every
//! decoded record is published to a [`RecordSlot`] that readers on other
//! threads can poll.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{HrvConfig, SensorConfig};
use crate::error::ComputeError;
use crate::parsers::{FrameParser, SensorParser};
use crate::stats::HrvSummary;
use crate::types::{SensorState, TelemetryRecord, Vendor};

/// Latest published record, shared between the decode path and readers.
///
/// Publishing swaps in a fully built record, so readers never observe a
/// partially decoded frame.
#[derive(Debug, Clone, Default)]
pub struct RecordSlot {
    inner: Arc<RwLock<Option<Arc<TelemetryRecord>>>>,
}

impl RecordSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, record: TelemetryRecord) -> Arc<TelemetryRecord> {
        let record = Arc::new(record);
        *self.inner.write() = Some(Arc::clone(&record));
        record
    }

    pub fn latest(&self) -> Option<Arc<TelemetryRecord>> {
        self.inner.read().clone()
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

/// Frame counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames_decoded: u64,
    pub frames_rejected: u64,
    /// Bytes skipped while searching for a frame boundary
    pub bytes_skipped: u64,
}

/// One sensor connection: parser, stream buffer and latest record
#[derive(Debug)]
pub struct SensorSession {
    id: Uuid,
    config: SensorConfig,
    parser: SensorParser,
    state: SensorState,
    buffer: Vec<u8>,
    slot: RecordSlot,
    stats: SessionStats,
}

impl SensorSession {
    pub fn new(vendor: Vendor, config: SensorConfig) -> Self {
        let id = Uuid::new_v4();
        log::info!("sensor session {} opened for {}", id, vendor);
        Self {
            id,
            parser: SensorParser::new(vendor, &config),
            config,
            state: SensorState::Connecting,
            buffer: Vec::new(),
            slot: RecordSlot::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn vendor(&self) -> Vendor {
        self.parser.vendor()
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Connection state reported by the transport
    pub fn set_state(&mut self, state: SensorState) {
        if state != self.state {
            log::info!("sensor session {}: {:?} -> {:?}", self.id, self.state, state);
            self.state = state;
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn parser(&self) -> &SensorParser {
        &self.parser
    }

    /// Handle for readers of the latest record
    pub fn slot(&self) -> RecordSlot {
        self.slot.clone()
    }

    pub fn latest(&self) -> Option<Arc<TelemetryRecord>> {
        self.slot.latest()
    }

    /// Bytes buffered but not yet decoded
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed bytes from the transport and decode every complete frame.
    ///
    /// BLE sessions treat `bytes` as one characteristic value.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<TelemetryRecord> {
        if self.vendor().is_ble() {
            return self.decode_payload(bytes).into_iter().collect();
        }

        self.buffer.extend_from_slice(bytes);
        let mut records = Vec::new();
        let frame_size = self.parser.frame_size();

        while self.buffer.len() >= frame_size {
            match self.parser.find_alignment(&self.buffer) {
                None => {
                    // keep a tail that may hold the start of the next frame
                    let skip = self.buffer.len() - (frame_size - 1);
                    self.skip(skip);
                    break;
                }
                Some(0) => {}
                Some(offset) => {
                    self.skip(offset);
                    continue;
                }
            }

            match self.parser.decode(&self.buffer) {
                Ok(record) => {
                    let consumed = self.parser.frame_len(&self.buffer).min(self.buffer.len());
                    self.buffer.drain(..consumed);
                    records.push(self.accept(record));
                }
                Err(e) if e.is_structural() => {
                    log::debug!("{} frame rejected, realigning: {}", self.vendor(), e);
                    self.stats.frames_rejected += 1;
                    self.skip(1);
                }
                Err(e) => {
                    log::debug!("{} frame rejected: {}", self.vendor(), e);
                    self.stats.frames_rejected += 1;
                    let consumed = self.parser.frame_len(&self.buffer).min(self.buffer.len());
                    self.buffer.drain(..consumed);
                }
            }
        }
        records
    }

    /// Route a BLE characteristic notification to this session's parser
    pub fn on_characteristic(
        &mut self,
        service: &Uuid,
        characteristic: &Uuid,
        payload: &[u8],
    ) -> Result<Option<TelemetryRecord>, ComputeError> {
        let vendor = Vendor::from_gatt(service, characteristic).ok_or_else(|| {
            ComputeError::UnknownCharacteristic {
                service: service.to_string(),
                characteristic: characteristic.to_string(),
            }
        })?;
        if vendor != self.vendor() {
            log::warn!(
                "sensor session {} ({}) got a {} notification",
                self.id,
                self.vendor(),
                vendor
            );
            return Err(ComputeError::UnsupportedVendor(format!(
                "{} notification on a {} session",
                vendor,
                self.vendor()
            )));
        }
        Ok(self.decode_payload(payload))
    }

    /// RR intervals collected on this connection
    pub fn rr_snapshot(&self) -> Vec<f64> {
        self.parser.rr_snapshot()
    }

    pub fn hrv_summary(&self, config: &HrvConfig) -> HrvSummary {
        HrvSummary::compute(&self.rr_snapshot(), config)
    }

    /// Tear down connection state ahead of a reconnect
    pub fn reset(&mut self) {
        log::info!("sensor session {} reset", self.id);
        self.parser.reset();
        self.buffer.clear();
        self.slot.clear();
        self.stats = SessionStats::default();
        self.state = SensorState::Connecting;
    }

    fn decode_payload(&mut self, payload: &[u8]) -> Option<TelemetryRecord> {
        match self.parser.decode(payload) {
            Ok(record) => Some(self.accept(record)),
            Err(e) => {
                log::debug!("{} payload rejected: {}", self.vendor(), e);
                self.stats.frames_rejected += 1;
                None
            }
        }
    }

    fn accept(&mut self, record: TelemetryRecord) -> TelemetryRecord {
        self.stats.frames_decoded += 1;
        if self.state != SensorState::Sending {
            self.set_state(SensorState::Sending);
        }
        self.slot.publish(record.clone());
        record
    }

    fn skip(&mut self, count: usize) {
        if count > 0 {
            log::trace!("{} skipping {} bytes", self.vendor(), count);
            self.stats.bytes_skipped += count as u64;
            self.buffer.drain(..count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crc8;
    use crate::types::gatt;
    use pretty_assertions::assert_eq;

    const POLAR_SINGLE: [u8; 8] = [0xFE, 0x08, 0xF7, 0x06, 0xF1, 0x48, 0x03, 0x64];
    const POLAR_DOUBLE: [u8; 10] = [0xFE, 0x0A, 0xF5, 0x06, 0xF1, 0x48, 0x03, 0x64, 0x03, 0x70];

    fn polar_session() -> SensorSession {
        SensorSession::new(Vendor::Polar, SensorConfig::default())
    }

    fn zephyr_frame(heart_rate: u8) -> Vec<u8> {
        let mut f = vec![0u8; 60];
        f[0] = 0x02;
        f[12] = heart_rate;
        f[58] = crc8(&f[3..58]);
        f[59] = 0x03;
        f
    }

    #[test]
    fn test_waits_for_a_full_frame_size() {
        let mut session = polar_session();
        assert!(session.feed(&POLAR_SINGLE).is_empty());
        assert_eq!(session.pending(), 8);
        let records = session.feed(&POLAR_DOUBLE);
        assert_eq!(records.len(), 1);
        assert_eq!(session.state(), SensorState::Sending);
    }

    #[test]
    fn test_stream_with_garbage_between_frames() {
        let mut session = polar_session();
        let mut stream = vec![0x00, 0x42];
        for _ in 0..3 {
            stream.extend_from_slice(&POLAR_DOUBLE);
            stream.push(0x99);
        }
        stream.extend_from_slice(&[0x00; 16]);
        let records = session.feed(&stream);
        assert_eq!(records.len(), 3);
        assert!(records
            .iter()
            .all(|r| r.heart_rate.and_then(|h| h.value()) == Some(868)));
        assert_eq!(session.stats().frames_decoded, 3);
        assert_eq!(session.rr_snapshot().len(), 6);
    }

    #[test]
    fn test_out_of_range_frame_is_skipped() {
        let mut session = polar_session();
        let mut stream = vec![0xFE, 0x08, 0xF7, 0x06, 0xF1, 0x48, 0x00, 0x64];
        stream.extend_from_slice(&POLAR_DOUBLE);
        stream.extend_from_slice(&[0x00; 8]);
        let records = session.feed(&stream);
        assert_eq!(records.len(), 1);
        assert_eq!(session.stats().frames_rejected, 1);
    }

    fn neurosky_frame(attention: u8, meditation: u8) -> Vec<u8> {
        let mut f = vec![0xAA, 0xAA, 0x04, 0x80, 0x02, 0x00, attention, meditation];
        f.resize(170, 0x01);
        f
    }

    #[test]
    fn test_neurosky_frames_decode_in_order() {
        let mut stream = neurosky_frame(20, 25);
        stream.extend(neurosky_frame(70, 75));

        let mut whole = SensorSession::new(Vendor::Neurosky, SensorConfig::default());
        let whole_attention: Vec<_> = whole
            .feed(&stream)
            .iter()
            .map(|r| r.attention.and_then(|a| a.value()))
            .collect();

        let mut chunked = SensorSession::new(Vendor::Neurosky, SensorConfig::default());
        let chunked_attention: Vec<_> = stream
            .chunks(170)
            .flat_map(|c| chunked.feed(c))
            .map(|r| r.attention.and_then(|a| a.value()))
            .collect();

        assert_eq!(whole_attention, vec![Some(20), Some(70)]);
        assert_eq!(chunked_attention, whole_attention);
    }

    #[test]
    fn test_latest_record_published() {
        let mut session = SensorSession::new(Vendor::Zephyr, SensorConfig::default());
        let slot = session.slot();
        assert!(slot.latest().is_none());

        let mut stream = zephyr_frame(65);
        stream.extend(zephyr_frame(66));
        let records = session.feed(&stream);
        assert_eq!(records.len(), 2);

        let latest = slot.latest().unwrap();
        assert_eq!(latest.heart_rate.and_then(|r| r.value()), Some(66));
        assert_eq!(*latest, records[1]);
    }

    #[test]
    fn test_slot_readable_from_another_thread() {
        let mut session = polar_session();
        let slot = session.slot();
        let mut stream = POLAR_DOUBLE.to_vec();
        stream.extend_from_slice(&[0x00; 8]);
        session.feed(&stream);

        let reader = std::thread::spawn(move || slot.latest().map(|r| r.vendor));
        assert_eq!(reader.join().unwrap(), Some(Vendor::Polar));
    }

    #[test]
    fn test_unaligned_bytes_bounded() {
        let mut session = SensorSession::new(Vendor::Zephyr, SensorConfig::default());
        session.feed(&[0x55; 500]);
        assert_eq!(session.pending(), 59);
        assert_eq!(session.stats().bytes_skipped, 441);
    }

    #[test]
    fn test_ble_routing() {
        let mut session = SensorSession::new(Vendor::BleHrm, SensorConfig::default());
        let record = session
            .on_characteristic(&gatt::HEART_RATE_SERVICE, &gatt::HEART_RATE_MEASUREMENT, &[0x00, 64])
            .unwrap()
            .unwrap();
        assert_eq!(record.heart_rate.and_then(|r| r.value()), Some(64));

        let wrong = session.on_characteristic(
            &gatt::CYCLING_SPEED_CADENCE_SERVICE,
            &gatt::CSC_MEASUREMENT,
            &[0x00],
        );
        assert!(matches!(wrong, Err(ComputeError::UnsupportedVendor(_))));

        let unknown = session.on_characteristic(
            &gatt::HEART_RATE_SERVICE,
            &gatt::BODY_SENSOR_LOCATION,
            &[0x01],
        );
        assert!(matches!(
            unknown,
            Err(ComputeError::UnknownCharacteristic { .. })
        ));
    }

    #[test]
    fn test_ble_feed_is_one_payload() {
        let mut session = SensorSession::new(Vendor::BleHrm, SensorConfig::default());
        assert_eq!(session.feed(&[0x00, 70]).len(), 1);
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn test_reset() {
        let mut session = polar_session();
        let mut stream = POLAR_DOUBLE.to_vec();
        stream.extend_from_slice(&[0x00; 8]);
        session.feed(&stream);
        session.reset();
        assert!(session.latest().is_none());
        assert!(session.rr_snapshot().is_empty());
        assert_eq!(session.stats(), SessionStats::default());
        assert_eq!(session.state(), SensorState::Connecting);
    }
}
