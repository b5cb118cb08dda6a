//! Core types for biotracks-flux
//!
//! This module defines the normalized telemetry record every parser emits and
//! the vendor identifiers used to pick a parser for a connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ComputeError;

/// Sensor vendor / protocol identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Polar Wearlink over classic Bluetooth serial
    Polar,
    /// Zephyr HxM over classic Bluetooth serial
    Zephyr,
    /// NeuroSky ThinkGear headset over classic Bluetooth serial
    Neurosky,
    /// Bluetooth Low Energy Heart Rate Measurement characteristic
    BleHrm,
    /// Bluetooth Low Energy Cycling Speed and Cadence measurement characteristic
    BleCsc,
}

impl Vendor {
    pub const ALL: [Vendor; 5] = [
        Vendor::Polar,
        Vendor::Zephyr,
        Vendor::Neurosky,
        Vendor::BleHrm,
        Vendor::BleCsc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Polar => "polar",
            Vendor::Zephyr => "zephyr",
            Vendor::Neurosky => "neurosky",
            Vendor::BleHrm => "ble_hrm",
            Vendor::BleCsc => "ble_csc",
        }
    }

    /// Whether payloads arrive as GATT notifications rather than a serial stream
    pub fn is_ble(&self) -> bool {
        matches!(self, Vendor::BleHrm | Vendor::BleCsc)
    }

    /// Select the BLE parser for a service / measurement characteristic pair
    pub fn from_gatt(service: &Uuid, characteristic: &Uuid) -> Option<Vendor> {
        if *service == gatt::HEART_RATE_SERVICE
            && *characteristic == gatt::HEART_RATE_MEASUREMENT
        {
            Some(Vendor::BleHrm)
        } else if *service == gatt::CYCLING_SPEED_CADENCE_SERVICE
            && *characteristic == gatt::CSC_MEASUREMENT
        {
            Some(Vendor::BleCsc)
        } else {
            None
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Vendor::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ComputeError::UnsupportedVendor(s.to_string()))
    }
}

/// Bluetooth SIG assigned GATT identifiers used for parser routing
pub mod gatt {
    use uuid::Uuid;

    const fn sig_uuid(short: u16) -> Uuid {
        // 0000xxxx-0000-1000-8000-00805f9b34fb
        Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5f9b_34fb)
    }

    pub const HEART_RATE_SERVICE: Uuid = sig_uuid(0x180D);
    pub const HEART_RATE_MEASUREMENT: Uuid = sig_uuid(0x2A37);
    pub const BODY_SENSOR_LOCATION: Uuid = sig_uuid(0x2A38);
    pub const CYCLING_SPEED_CADENCE_SERVICE: Uuid = sig_uuid(0x1816);
    pub const CSC_MEASUREMENT: Uuid = sig_uuid(0x2A5B);
}

/// Connection / channel state reported alongside a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorState {
    #[default]
    None,
    Connecting,
    Connected,
    Disconnected,
    Sending,
}

/// One channel of a telemetry record
///
/// A `Sending` reading always carries a value; the only way to build one is
/// [`SensorReading::sending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<i32>,
    state: SensorState,
}

impl SensorReading {
    /// A live measurement
    pub fn sending(value: i32) -> Self {
        Self {
            value: Some(value),
            state: SensorState::Sending,
        }
    }

    /// A status-only reading (no measurement). `Sending` is coerced to
    /// `Connected` since it would otherwise lack a value.
    pub fn status(state: SensorState) -> Self {
        let state = if state == SensorState::Sending {
            SensorState::Connected
        } else {
            state
        };
        Self { value: None, state }
    }

    pub fn value(&self) -> Option<i32> {
        self.value
    }

    pub fn state(&self) -> SensorState {
        self.state
    }
}

/// Normalized telemetry decoded from one sensor frame
///
/// Each channel is independent; `None` means "not measured this frame".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// When the frame was decoded (UTC)
    pub creation_time: DateTime<Utc>,
    /// Vendor that produced the frame
    pub vendor: Vendor,
    /// Primary heart channel (RR-derived for Polar, BPM for Zephyr / BLE)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<SensorReading>,
    /// Second RR interval of a multi-beat frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate_rc1: Option<SensorReading>,
    /// Third RR interval of a multi-beat frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate_rc2: Option<SensorReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<SensorReading>,
    /// RMSSD over the connection's RR history (ms, rounded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rmssd: Option<SensorReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cadence: Option<SensorReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<SensorReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<SensorReading>,
    /// eSense attention (0-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attention: Option<SensorReading>,
    /// eSense meditation (0-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meditation: Option<SensorReading>,
}

impl TelemetryRecord {
    /// Start a record stamped with the current time
    pub fn builder(vendor: Vendor) -> TelemetryRecordBuilder {
        TelemetryRecordBuilder::new(vendor, Utc::now())
    }

    /// Whether no channel was measured
    pub fn is_empty(&self) -> bool {
        self.channels().iter().all(|(_, reading)| reading.is_none())
    }

    /// All channels by name, in declaration order
    pub fn channels(&self) -> [(&'static str, Option<SensorReading>); 10] {
        [
            ("heart_rate", self.heart_rate),
            ("heart_rate_rc1", self.heart_rate_rc1),
            ("heart_rate_rc2", self.heart_rate_rc2),
            ("bpm", self.bpm),
            ("rmssd", self.rmssd),
            ("cadence", self.cadence),
            ("power", self.power),
            ("battery_level", self.battery_level),
            ("attention", self.attention),
            ("meditation", self.meditation),
        ]
    }

    /// Serialize to a single JSON line
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Builder that assembles a record before it becomes immutable
#[derive(Debug, Clone)]
pub struct TelemetryRecordBuilder {
    record: TelemetryRecord,
}

impl TelemetryRecordBuilder {
    pub fn new(vendor: Vendor, creation_time: DateTime<Utc>) -> Self {
        Self {
            record: TelemetryRecord {
                creation_time,
                vendor,
                heart_rate: None,
                heart_rate_rc1: None,
                heart_rate_rc2: None,
                bpm: None,
                rmssd: None,
                cadence: None,
                power: None,
                battery_level: None,
                attention: None,
                meditation: None,
            },
        }
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.record.creation_time
    }

    pub fn heart_rate(mut self, value: i32) -> Self {
        self.record.heart_rate = Some(SensorReading::sending(value));
        self
    }

    pub fn heart_rate_rc1(mut self, value: i32) -> Self {
        self.record.heart_rate_rc1 = Some(SensorReading::sending(value));
        self
    }

    pub fn heart_rate_rc2(mut self, value: i32) -> Self {
        self.record.heart_rate_rc2 = Some(SensorReading::sending(value));
        self
    }

    pub fn bpm(mut self, value: i32) -> Self {
        self.record.bpm = Some(SensorReading::sending(value));
        self
    }

    pub fn rmssd(mut self, value: i32) -> Self {
        self.record.rmssd = Some(SensorReading::sending(value));
        self
    }

    pub fn cadence(mut self, value: i32) -> Self {
        self.record.cadence = Some(SensorReading::sending(value));
        self
    }

    pub fn power(mut self, value: i32) -> Self {
        self.record.power = Some(SensorReading::sending(value));
        self
    }

    pub fn battery_level(mut self, value: i32) -> Self {
        self.record.battery_level = Some(SensorReading::sending(value));
        self
    }

    pub fn attention(mut self, value: i32) -> Self {
        self.record.attention = Some(SensorReading::sending(value));
        self
    }

    pub fn meditation(mut self, value: i32) -> Self {
        self.record.meditation = Some(SensorReading::sending(value));
        self
    }

    pub fn build(self) -> TelemetryRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sending_always_has_value() {
        let reading = SensorReading::sending(72);
        assert_eq!(reading.state(), SensorState::Sending);
        assert_eq!(reading.value(), Some(72));

        let status = SensorReading::status(SensorState::Sending);
        assert_eq!(status.state(), SensorState::Connected);
        assert_eq!(status.value(), None);
    }

    #[test]
    fn test_absent_channels_not_serialized() {
        let record = TelemetryRecord::builder(Vendor::Polar)
            .heart_rate(868)
            .bpm(69)
            .build();
        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();

        assert_eq!(json["vendor"], "polar");
        assert_eq!(json["heart_rate"]["value"], 868);
        assert_eq!(json["heart_rate"]["state"], "SENDING");
        assert!(json.get("cadence").is_none());
        assert!(json.get("attention").is_none());
    }

    #[test]
    fn test_empty_record() {
        let record = TelemetryRecord::builder(Vendor::BleCsc).build();
        assert!(record.is_empty());
        let record = TelemetryRecord::builder(Vendor::BleCsc).cadence(90).build();
        assert!(!record.is_empty());
    }

    #[test]
    fn test_vendor_from_str() {
        assert_eq!("polar".parse::<Vendor>().unwrap(), Vendor::Polar);
        assert_eq!("BLE_HRM".parse::<Vendor>().unwrap(), Vendor::BleHrm);
        assert!("garmin".parse::<Vendor>().is_err());
    }

    #[test]
    fn test_vendor_from_gatt() {
        let hr_service = Uuid::parse_str("0000180d-0000-1000-8000-00805f9b34fb").unwrap();
        let hr_measurement = Uuid::parse_str("00002a37-0000-1000-8000-00805f9b34fb").unwrap();
        let csc_service = Uuid::parse_str("00001816-0000-1000-8000-00805f9b34fb").unwrap();
        let csc_measurement = Uuid::parse_str("00002a5b-0000-1000-8000-00805f9b34fb").unwrap();

        assert_eq!(
            Vendor::from_gatt(&hr_service, &hr_measurement),
            Some(Vendor::BleHrm)
        );
        assert_eq!(
            Vendor::from_gatt(&csc_service, &csc_measurement),
            Some(Vendor::BleCsc)
        );
        assert_eq!(Vendor::from_gatt(&hr_service, &csc_measurement), None);
        assert_eq!(Vendor::from_gatt(&gatt::HEART_RATE_SERVICE, &gatt::BODY_SENSOR_LOCATION), None);
    }
}
