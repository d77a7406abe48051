//! Error taxonomy.
//!
//! Decode errors are recoverable per-frame: a decoder returns one of these,
//! the caller logs it and moves on to the next frame. Capture/persistence
//! errors are subsystem-level and drive the pipeline's shutdown/backoff
//! behavior.

use thiserror::Error;

/// Errors a decoder can return for a single frame or header.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DecodeError {
    #[error("truncated: have {have} bytes, need {need}")]
    Truncated { have: usize, need: usize },

    #[error("invalid header length: {value}")]
    InvalidHeaderLength { value: usize },

    #[error("invalid length field: declared {declared}, have {have}")]
    InvalidLengthField { declared: usize, have: usize },

    #[error("unsupported ethertype: 0x{value:04x}")]
    UnsupportedEtherType { value: u16 },

    #[error("unsupported protocol: {value}")]
    UnsupportedProtocol { value: u8 },

    #[error("malformed ipv6 extension header chain")]
    MalformedIPv6Chain,

    #[error("malformed name")]
    MalformedName,

    #[error("malformed option")]
    MalformedOption,
}

/// Errors from the bounded capture queue.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum QueueError {
    #[error("queue is full")]
    QueueFull,
    #[error("allocation failed")]
    AllocFailed,
}

/// Errors from the persistence subsystem (JSON snapshot + database sink).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to connect to database: {0}")]
    DbConnectFailed(#[source] rusqlite::Error),

    #[error("database query failed: {0}")]
    DbQueryFailed(#[source] rusqlite::Error),

    #[error("failed to write json snapshot: {0}")]
    JsonWriteFailed(#[source] std::io::Error),
}

/// Errors opening or running the capture source.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open capture device: {0}")]
    CaptureOpenFailed(String),

    #[error("no capture devices found")]
    NoDevicesFound,

    #[error("invalid device selection: {0}")]
    InvalidSelection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_messages_carry_fields() {
        let e = DecodeError::Truncated { have: 3, need: 8 };
        assert_eq!(e.to_string(), "truncated: have 3 bytes, need 8");

        let e = DecodeError::UnsupportedEtherType { value: 0x88cc };
        assert_eq!(e.to_string(), "unsupported ethertype: 0x88cc");
    }

    #[test]
    fn queue_error_variants_render() {
        assert_eq!(QueueError::QueueFull.to_string(), "queue is full");
    }
}
