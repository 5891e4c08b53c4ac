//! # eip-tags
//!
//! Native EtherNet/IP client for reading and writing named tags on
//! industrial PLCs over TCP. Callers address data by symbolic tag name
//! (optionally with array indices or bit selectors) and primitive data type;
//! the library frames the embedded CIP requests, manages the session
//! lifecycle, chunks oversize array transfers, and decodes replies into
//! typed values.
//!
//! ## Features
//!
//! - Typed scalar and array operations: REAL, DINT, BOOL, STRING
//! - Automatic chunking of large array reads and writes, with adaptive
//!   shrinking when the controller rejects a request as too long
//! - Bit-level read-modify-write on integer host tags (`i=Word[5]`,
//!   `Word[5]` for `write_bool`)
//! - Backplane routing via a configurable port/slot path
//! - Both async ([`TagClient`]) and blocking ([`blocking::TagClient`]) calls
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use eip_tags::{ClientConfig, TagClient};
//!
//! #[tokio::main]
//! async fn main() -> eip_tags::Result<()> {
//!     let config = ClientConfig::new("192.168.1.10").with_path("1,0");
//!     let client = TagClient::new(config);
//!
//!     client.write_dint("Counter", 42).await?;
//!     let count = client.read_dint("Counter").await?;
//!     assert_eq!(count, 42);
//!
//!     let temps = client.read_float_array("Temps[0]", 200).await?;
//!     println!("first reading: {}", temps[0]);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Addressing
//!
//! Tag addresses follow `name(.name)*` with optional bracketed element
//! indices (`Arr[12]`, `Line.Drive[3].Cmd`). The prefix `i=` selects bit
//! access on an integer host tag: `i=StatusWord[5]` and `i=StatusWord.5`
//! both name bit 5, counted LSB-first from element 0.

use std::time::Duration;

use log::warn;

pub mod bits;
pub mod blocking;
pub mod chunking;
pub mod codec;
pub mod error;
pub mod strings;
pub mod tag_path;

mod client;
mod session;

pub use client::TagClient;
pub use codec::CipResponse;
pub use error::{cip_status_message, EipError, Result};
pub use session::{DEFAULT_PORT, DEFAULT_TIMEOUT};

/// Route path steering CIP services through the PLC backplane.
///
/// Parsed once from a constructor string; tokens are separated by `,` or `;`
/// and each is a decimal integer 0–255 or `0x`-prefixed hex. An empty or
/// malformed string falls back to the canonical backplane default `[1, 0]`
/// (port 1, slot 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePath {
    bytes: Vec<u8>,
}

impl Default for RoutePath {
    fn default() -> Self {
        Self { bytes: vec![1, 0] }
    }
}

impl RoutePath {
    /// Parses a route path string, falling back to the default on any
    /// malformed token.
    pub fn parse(path: &str) -> Self {
        if path.trim().is_empty() {
            return Self::default();
        }
        let mut bytes = Vec::new();
        for token in path.split([',', ';']) {
            let token = token.trim();
            let parsed = if let Some(hex) = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
            {
                u8::from_str_radix(hex, 16).ok()
            } else {
                token.parse::<u8>().ok()
            };
            match parsed {
                Some(value) => bytes.push(value),
                None => {
                    warn!("malformed route path '{}', using default [1, 0]", path);
                    return Self::default();
                }
            }
        }
        Self { bytes }
    }

    /// Raw port/link bytes in transmission order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Human-readable form for log lines.
    pub fn describe(&self) -> String {
        match self.bytes.as_slice() {
            [1, slot] => format!("backplane slot {}", slot),
            other => format!("route {:?}", other),
        }
    }
}

/// Connection options for one PLC target.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host address (IP or name) of the PLC.
    pub host: String,
    /// TCP port, 44818 unless overridden.
    pub port: u16,
    /// Backplane route for every CIP service.
    pub route_path: RoutePath,
    /// Per-operation timeout, applied to connects, reads and writes.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for the given host with the default port,
    /// route path and timeout.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            route_path: RoutePath::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the backplane route from a path string such as `"1,0"`.
    pub fn with_path(mut self, path: &str) -> Self {
        self.route_path = RoutePath::parse(path);
        self
    }

    /// Overrides the TCP port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the per-operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of an array read.
///
/// The controller may return fewer elements than requested; the view exposes
/// `min(requested, decoded)` elements regardless of the physical buffer
/// length behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayView<T> {
    buf: Vec<T>,
    len: usize,
}

impl<T> ArrayView<T> {
    pub(crate) fn new(buf: Vec<T>, requested: usize) -> Self {
        let len = requested.min(buf.len());
        Self { buf, len }
    }

    /// Number of valid elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no valid elements were returned.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The valid elements.
    pub fn as_slice(&self) -> &[T] {
        &self.buf[..self.len]
    }

    /// Consumes the view, keeping only the valid elements.
    pub fn into_vec(mut self) -> Vec<T> {
        self.buf.truncate(self.len);
        self.buf
    }
}

impl<T> std::ops::Deref for ArrayView<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}
