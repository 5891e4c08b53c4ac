//! Error types for the EtherNet/IP tag client.
//!
//! Every public operation returns [`Result<T>`]. Protocol failures carry the
//! numeric status from the wire so callers can match on the exact condition;
//! [`cip_status_message`] maps CIP general statuses to readable text.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, EipError>;

/// Failures surfaced by tag operations.
#[derive(Debug, Error)]
pub enum EipError {
    /// The tag address does not satisfy the grammar in a context that
    /// requires structural validity (e.g. bit access with no bit selector).
    #[error("invalid tag address: {0}")]
    InvalidAddress(String),

    /// No response within the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The TCP connection to the PLC could not be established.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        /// Target address that refused or dropped the attempt.
        addr: String,
        /// Underlying socket error.
        source: io::Error,
    },

    /// The peer closed the connection mid-exchange.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Non-zero encapsulation status in a reply header.
    #[error("encapsulation error, status 0x{0:08X}")]
    Encapsulation(u32),

    /// Read Tag service failed with the given CIP general status.
    #[error("read failed, CIP status 0x{code:02X}: {msg}", code = .0, msg = cip_status_message(*.0))]
    ReadFailed(u8),

    /// Write Tag service failed with the given CIP general status.
    #[error("write failed, CIP status 0x{code:02X}: {msg}", code = .0, msg = cip_status_message(*.0))]
    WriteFailed(u8),

    /// Response shorter than its declared content.
    #[error("truncated response ({0} bytes)")]
    TruncatedResponse(usize),

    /// Multi-service reply or unknown reply service code.
    #[error("unsupported reply service 0x{0:02X}")]
    UnsupportedService(u8),

    /// Socket-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The caller cancelled the operation; the session is closed because the
    /// stream may hold partial bytes.
    #[error("operation cancelled")]
    Cancelled,
}

/// Human-readable text for a CIP general status code.
pub fn cip_status_message(status: u8) -> &'static str {
    match status {
        0x00 => "success",
        0x01 => "connection failure",
        0x02 => "resource unavailable",
        0x03 => "invalid parameter value",
        0x04 => "path segment error",
        0x05 => "path destination unknown",
        0x06 => "partial transfer",
        0x07 => "connection lost",
        0x08 => "service not supported",
        0x09 => "invalid attribute value",
        0x0A => "attribute list error",
        0x0B => "already in requested mode/state",
        0x0C => "object state conflict",
        0x0D => "object already exists",
        0x0E => "attribute not settable",
        0x0F => "privilege violation",
        0x10 => "device state conflict",
        0x11 => "reply data too large",
        0x12 => "fragmentation of a primitive value",
        0x13 => "not enough data",
        0x14 => "attribute not supported",
        0x15 => "too much data",
        0x16 => "object does not exist",
        0x17 => "service fragmentation sequence not in progress",
        0x18 => "no stored attribute data",
        0x19 => "store operation failure",
        0x1A => "routing failure, request packet too large",
        0x1B => "routing failure, response packet too large",
        0x1C => "missing attribute list entry data",
        0x1D => "invalid attribute value list",
        0x1E => "embedded service error",
        0x1F => "vendor specific error",
        0x20 => "invalid parameter",
        0x21 => "write-once value or medium already written",
        0x22 => "invalid reply received",
        0x23 => "buffer overflow",
        0x24 => "invalid message format",
        0x25 => "key failure in path",
        0x26 => "path size invalid",
        0x27 => "unexpected attribute in list",
        0x28 => "invalid member ID",
        0x29 => "member not settable",
        _ => "unknown CIP status",
    }
}
