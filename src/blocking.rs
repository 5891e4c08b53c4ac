//! Blocking variants of the tag operations.
//!
//! Every method mirrors its async counterpart on [`crate::TagClient`] and
//! runs it to completion on a shared runtime. Use one client per PLC target;
//! distinct clients share nothing.

use lazy_static::lazy_static;
use tokio::runtime::Runtime;

use crate::{ArrayView, ClientConfig, Result};

lazy_static! {
    /// Shared runtime that executes async operations for blocking callers.
    static ref RUNTIME: Runtime = Runtime::new().unwrap();
}

/// Blocking client for reading and writing named tags on one PLC.
///
/// # Examples
///
/// ```rust,no_run
/// use eip_tags::blocking::TagClient;
/// use eip_tags::ClientConfig;
///
/// fn main() -> eip_tags::Result<()> {
///     let client = TagClient::new(ClientConfig::new("192.168.1.10"));
///     client.write_float("SetPoint", 72.5)?;
///     println!("SetPoint = {}", client.read_float("SetPoint")?);
///     client.close();
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct TagClient {
    inner: crate::TagClient,
}

impl TagClient {
    /// Creates a client for the configured PLC. No I/O happens until the
    /// first operation.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: crate::TagClient::new(config),
        }
    }

    /// Reads a REAL tag.
    pub fn read_float(&self, address: &str) -> Result<f32> {
        RUNTIME.block_on(self.inner.read_float(address))
    }

    /// Writes a REAL tag.
    pub fn write_float(&self, address: &str, value: f32) -> Result<()> {
        RUNTIME.block_on(self.inner.write_float(address, value))
    }

    /// Reads a DINT tag.
    pub fn read_dint(&self, address: &str) -> Result<i32> {
        RUNTIME.block_on(self.inner.read_dint(address))
    }

    /// Writes a DINT tag.
    pub fn write_dint(&self, address: &str, value: i32) -> Result<()> {
        RUNTIME.block_on(self.inner.write_dint(address, value))
    }

    /// Writes a BOOL tag; bracketed or `i=` addresses select a single bit.
    pub fn write_bool(&self, address: &str, value: bool) -> Result<()> {
        RUNTIME.block_on(self.inner.write_bool(address, value))
    }

    /// Reads a STRING tag.
    pub fn read_string(&self, address: &str) -> Result<String> {
        RUNTIME.block_on(self.inner.read_string(address))
    }

    /// Writes a STRING tag.
    pub fn write_string(&self, address: &str, value: &str) -> Result<()> {
        RUNTIME.block_on(self.inner.write_string(address, value))
    }

    /// Reads `count` REAL elements.
    pub fn read_float_array(&self, address: &str, count: usize) -> Result<ArrayView<f32>> {
        RUNTIME.block_on(self.inner.read_float_array(address, count))
    }

    /// Writes a REAL array with adaptive chunking.
    pub fn write_float_array(&self, address: &str, values: &[f32]) -> Result<()> {
        RUNTIME.block_on(self.inner.write_float_array(address, values))
    }

    /// Reads `count` DINT elements.
    pub fn read_dint_array(&self, address: &str, count: usize) -> Result<ArrayView<i32>> {
        RUNTIME.block_on(self.inner.read_dint_array(address, count))
    }

    /// Writes a DINT array with adaptive chunking.
    pub fn write_dint_array(&self, address: &str, values: &[i32]) -> Result<()> {
        RUNTIME.block_on(self.inner.write_dint_array(address, values))
    }

    /// Reads `count` booleans; see [`crate::TagClient::read_bool_array`].
    pub fn read_bool_array(&self, address: &str, count: usize) -> Result<ArrayView<bool>> {
        RUNTIME.block_on(self.inner.read_bool_array(address, count))
    }

    /// Writes a BOOL array in one service.
    pub fn write_bool_array(&self, address: &str, values: &[bool]) -> Result<()> {
        RUNTIME.block_on(self.inner.write_bool_array(address, values))
    }

    /// Reads `count` STRING elements.
    pub fn read_string_array(&self, address: &str, count: usize) -> Result<Vec<String>> {
        RUNTIME.block_on(self.inner.read_string_array(address, count))
    }

    /// Writes each string as its own request.
    pub fn write_string_array(&self, address: &str, values: &[&str]) -> Result<()> {
        RUNTIME.block_on(self.inner.write_string_array(address, values))
    }

    /// Unregisters the session and closes the socket. Safe to call twice.
    pub fn close(&self) {
        RUNTIME.block_on(self.inner.close())
    }
}
