//! Error types for biotracks-flux

use thiserror::Error;

/// Reasons a sensor frame produced no record.
///
/// The first group is structural (framing, sync, checksum); `OutOfRange` is
/// semantic. Neither is fatal: the caller skips the frame and keeps scanning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Buffer too short: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Missing sync marker at offset {offset}")]
    BadSync { offset: usize },

    #[error("Checksum mismatch: expected {expected:#04x}, found {found:#04x}")]
    BadChecksum { expected: u8, found: u8 },

    #[error("Invalid frame length: {0}")]
    BadLength(usize),

    #[error("Sequence number out of range: {0}")]
    BadSequence(u8),

    #[error("{what} out of range: {value}")]
    OutOfRange { what: &'static str, value: i64 },
}

impl DecodeError {
    /// Whether the failure concerns framing rather than decoded values
    pub fn is_structural(&self) -> bool {
        !matches!(self, DecodeError::OutOfRange { .. })
    }
}

/// Degenerate inputs for a statistic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("Insufficient samples: need {needed}, got {actual}")]
    InsufficientSamples { needed: usize, actual: usize },

    #[error("Zero variance in {0}")]
    ZeroVariance(&'static str),

    #[error("Zero denominator in {0}")]
    ZeroDenominator(&'static str),

    #[error("Logarithm undefined in {0}")]
    UndefinedLog(&'static str),

    #[error("Mismatched input lengths: {0} vs {1}")]
    LengthMismatch(usize, usize),

    #[error("Non-finite or non-positive value in {0}")]
    InvalidInput(&'static str),

    #[error("Series too long: more than {limit} samples")]
    TooManySamples { limit: usize },
}

/// Errors that can occur outside the decode path (configuration, FFI, CLI)
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported vendor: {0}")]
    UnsupportedVendor(String),

    #[error("Invalid hex input: {0}")]
    InvalidHex(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown GATT characteristic {characteristic} on service {service}")]
    UnknownCharacteristic { service: String, characteristic: String },

    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),
}
