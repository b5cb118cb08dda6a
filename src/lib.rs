//! Biotracks Flux - On-device decoding for wearable biosensor streams
//!
//! Flux turns raw bytes from wearable sensors into normalized telemetry
//! records through a per-connection pipeline: stream buffering → frame
//! alignment → vendor decoding → RR history → HRV statistics.
//!
//! ## Modules
//!
//! - **Parsers**: Polar Wearlink, Zephyr HxM, NeuroSky ThinkGear, BLE Heart
//!   Rate and BLE Cycling Speed and Cadence frame decoders
//! - **Session**: Stream re-alignment and latest-record publication per connection
//! - **Stats**: Time-domain, nonlinear and spectral HRV statistics

pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod parsers;
pub mod rate;
pub mod session;
pub mod stats;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{HrvConfig, SensorConfig};
pub use error::{ComputeError, DecodeError, StatsError};
pub use parsers::{FrameParser, SensorParser};
pub use session::{RecordSlot, SensorSession, SessionStats};
pub use stats::HrvSummary;
pub use types::{SensorReading, SensorState, TelemetryRecord, Vendor};

/// Library version reported by the CLI and FFI
pub const BIOTRACKS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported in diagnostics
pub const PRODUCER_NAME: &str = "biotracks-flux";
