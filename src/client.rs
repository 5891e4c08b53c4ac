//! Typed tag operations over one PLC session.

use log::{debug, error};
use tokio::sync::Mutex;

use crate::bits;
use crate::chunking::{self, WritePlan};
use crate::codec::{self, CipResponse};
use crate::error::{EipError, Result};
use crate::session::{self, Session};
use crate::strings;
use crate::tag_path;
use crate::{ArrayView, ClientConfig};

/// Asynchronous client for reading and writing named tags on one PLC.
///
/// The client owns a single TCP session; concurrent callers serialize on an
/// internal mutex, so requests observe strict FIFO order. Connection and
/// session registration happen lazily on the first operation.
///
/// # Examples
///
/// ```rust,no_run
/// use eip_tags::{ClientConfig, TagClient};
///
/// #[tokio::main]
/// async fn main() -> eip_tags::Result<()> {
///     let client = TagClient::new(ClientConfig::new("192.168.1.10").with_path("1,0"));
///
///     client.write_float("SetPoint", 72.5).await?;
///     let value = client.read_float("SetPoint").await?;
///     println!("SetPoint = {value}");
///
///     client.close().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct TagClient {
    session: Mutex<Session>,
}

impl TagClient {
    /// Creates a client for the configured PLC. No I/O happens until the
    /// first operation.
    pub fn new(config: ClientConfig) -> Self {
        debug!(
            "client for {}:{} via {}",
            config.host,
            config.port,
            config.route_path.describe()
        );
        let session = Session::new(
            config.host,
            config.port,
            config.route_path.as_bytes().to_vec(),
            config.timeout,
        );
        Self {
            session: Mutex::new(session),
        }
    }

    /// Current session handle; zero while unregistered.
    pub async fn session_handle(&self) -> u32 {
        self.session.lock().await.handle()
    }

    /// Unregisters the session (best effort) and closes the socket.
    /// Safe to call more than once.
    pub async fn close(&self) {
        self.session.lock().await.close().await;
    }

    // =====================================================================
    // Scalars
    // =====================================================================

    /// Reads a REAL tag.
    pub async fn read_float(&self, address: &str) -> Result<f32> {
        surface(address, self.fetch_float(address).await)
    }

    /// Writes a REAL tag.
    pub async fn write_float(&self, address: &str, value: f32) -> Result<()> {
        let result = self
            .write_raw(address, codec::TYPE_REAL, 1, &value.to_le_bytes())
            .await;
        surface(address, result)
    }

    /// Reads a DINT tag.
    pub async fn read_dint(&self, address: &str) -> Result<i32> {
        surface(address, self.fetch_dint(address).await)
    }

    /// Writes a DINT tag.
    pub async fn write_dint(&self, address: &str, value: i32) -> Result<()> {
        let result = self
            .write_raw(address, codec::TYPE_DINT, 1, &value.to_le_bytes())
            .await;
        surface(address, result)
    }

    /// Writes a BOOL tag.
    ///
    /// `name[N]` and `i=name[N]` / `i=name.N` forms address bit `N` of an
    /// integer host tag and go through read-modify-write; anything else is a
    /// plain single-element BOOL service.
    pub async fn write_bool(&self, address: &str, value: bool) -> Result<()> {
        surface(address, self.store_bool(address, value).await)
    }

    /// Reads a STRING tag.
    pub async fn read_string(&self, address: &str) -> Result<String> {
        let result = self
            .read_raw(address, 1)
            .await
            .map(|resp| strings::decode(&resp.payload));
        surface(address, result)
    }

    /// Writes a STRING tag.
    pub async fn write_string(&self, address: &str, value: &str) -> Result<()> {
        let payload = strings::encode(value);
        let result = self.write_raw(address, codec::TYPE_STRING, 1, &payload).await;
        surface(address, result)
    }

    // =====================================================================
    // Arrays
    // =====================================================================

    /// Reads `count` REAL elements starting at the address's index
    /// (or element 0 when unindexed).
    pub async fn read_float_array(&self, address: &str, count: usize) -> Result<ArrayView<f32>> {
        let result = self
            .read_array_4byte(address, count, |b| {
                f32::from_le_bytes([b[0], b[1], b[2], b[3]])
            })
            .await;
        surface(address, result)
    }

    /// Writes a REAL array with adaptive chunking.
    pub async fn write_float_array(&self, address: &str, values: &[f32]) -> Result<()> {
        let data: Vec<[u8; 4]> = values.iter().map(|v| v.to_le_bytes()).collect();
        let result = self.write_array_4byte(address, codec::TYPE_REAL, &data).await;
        surface(address, result)
    }

    /// Reads `count` DINT elements starting at the address's index.
    pub async fn read_dint_array(&self, address: &str, count: usize) -> Result<ArrayView<i32>> {
        let result = self
            .read_array_4byte(address, count, |b| {
                i32::from_le_bytes([b[0], b[1], b[2], b[3]])
            })
            .await;
        surface(address, result)
    }

    /// Writes a DINT array with adaptive chunking.
    pub async fn write_dint_array(&self, address: &str, values: &[i32]) -> Result<()> {
        let data: Vec<[u8; 4]> = values.iter().map(|v| v.to_le_bytes()).collect();
        let result = self.write_array_4byte(address, codec::TYPE_DINT, &data).await;
        surface(address, result)
    }

    /// Reads `count` booleans.
    ///
    /// With an `i=` prefix, or with an unindexed address, the returned data
    /// is treated as bit-packed in the host tag's elements (LSB-first).
    /// An address that names a concrete element (`name[N]`) reads `count`
    /// BOOL elements instead, one byte per element.
    pub async fn read_bool_array(&self, address: &str, count: usize) -> Result<ArrayView<bool>> {
        surface(address, self.fetch_bools(address, count).await)
    }

    /// Writes a BOOL array in one service, one byte per element.
    pub async fn write_bool_array(&self, address: &str, values: &[bool]) -> Result<()> {
        let bytes: Vec<u8> = values
            .iter()
            .map(|v| if *v { 0xFF } else { 0x00 })
            .collect();
        let result = self
            .write_raw(address, codec::TYPE_BOOL, values.len() as u16, &bytes)
            .await;
        surface(address, result)
    }

    /// Reads `count` STRING elements, one request per element when the
    /// address is indexed or `count > 1`.
    pub async fn read_string_array(&self, address: &str, count: usize) -> Result<Vec<String>> {
        surface(address, self.fetch_strings(address, count).await)
    }

    /// Writes each string as its own request at consecutive element indices.
    pub async fn write_string_array(&self, address: &str, values: &[&str]) -> Result<()> {
        surface(address, self.store_strings(address, values).await)
    }

    // =====================================================================
    // Internals
    // =====================================================================

    async fn read_raw(&self, address: &str, elements: u16) -> Result<CipResponse> {
        let service = codec::read_request(address, elements)?;
        let mut session = self.session.lock().await;
        let frame = session.transact(&service).await?;
        codec::parse_read_response(&frame)
    }

    async fn write_raw(
        &self,
        address: &str,
        type_code: u16,
        elements: u16,
        value: &[u8],
    ) -> Result<()> {
        let service = codec::write_request(address, type_code, elements, value)?;
        let mut session = self.session.lock().await;
        let frame = session.transact(&service).await?;
        codec::parse_write_response(&frame)
    }

    async fn fetch_float(&self, address: &str) -> Result<f32> {
        let resp = self.read_raw(address, 1).await?;
        if resp.payload.len() < 4 {
            return Err(EipError::TruncatedResponse(resp.payload.len()));
        }
        let p = &resp.payload;
        Ok(f32::from_le_bytes([p[0], p[1], p[2], p[3]]))
    }

    async fn fetch_dint(&self, address: &str) -> Result<i32> {
        let resp = self.read_raw(address, 1).await?;
        if resp.payload.len() < 4 {
            return Err(EipError::TruncatedResponse(resp.payload.len()));
        }
        let p = &resp.payload;
        Ok(i32::from_le_bytes([p[0], p[1], p[2], p[3]]))
    }

    async fn read_array_4byte<T>(
        &self,
        address: &str,
        count: usize,
        decode: impl Fn(&[u8]) -> T,
    ) -> Result<ArrayView<T>> {
        let (base, start) = tag_path::parse_array_start(address);
        let mut out = Vec::with_capacity(count);
        for (offset, len) in chunking::read_chunks(count) {
            let chunk_addr = tag_path::normalize_array_name(base, start + offset as u32);
            let resp = self.read_raw(&chunk_addr, len as u16).await?;
            for quad in resp.payload.chunks_exact(4) {
                out.push(decode(quad));
            }
        }
        Ok(ArrayView::new(out, count))
    }

    async fn write_array_4byte(
        &self,
        address: &str,
        type_code: u16,
        data: &[[u8; 4]],
    ) -> Result<()> {
        let (base, start) = tag_path::parse_array_start(address);
        let mut plan = WritePlan::new(data.len());
        while let Some((offset, len)) = plan.next_chunk() {
            let chunk_addr = tag_path::normalize_array_name(base, start + offset as u32);
            let bytes: Vec<u8> = data[offset..offset + len]
                .iter()
                .flatten()
                .copied()
                .collect();
            match self.write_raw(&chunk_addr, type_code, len as u16, &bytes).await {
                Ok(()) => plan.advance(len),
                Err(EipError::Encapsulation(status)) if session::is_retryable(status) => {
                    debug!(
                        "chunk of {} elements at '{}' rejected (status {}), halving",
                        len, chunk_addr, status
                    );
                    if !plan.shrink() {
                        return Err(EipError::Encapsulation(status));
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn store_bool(&self, address: &str, value: bool) -> Result<()> {
        if let Some((host, bit)) = tag_path::parse_bit_access(address) {
            return self.write_bit(host, bit, value).await;
        }
        if address.starts_with(tag_path::BIT_ACCESS_PREFIX) {
            return Err(EipError::InvalidAddress(address.to_string()));
        }
        if let Some((host, bit)) = tag_path::parse_bit(address) {
            return self.write_bit(host, bit, value).await;
        }
        let payload = if value { [0xFF, 0xFF] } else { [0x00, 0x00] };
        self.write_raw(address, codec::TYPE_BOOL, 1, &payload).await
    }

    /// Read-modify-write of one bit on an integer host tag.
    ///
    /// No bit other than the target changes: one host element is read, the
    /// single bit toggled in place, and the element written back with the
    /// host's own type code.
    async fn write_bit(&self, host: &str, bit: u32, value: bool) -> Result<()> {
        let (base, start) = tag_path::parse_array_start(host);
        let probe_addr = tag_path::normalize_array_name(base, start);
        let probe = self.read_raw(&probe_addr, 1).await?;
        let width = codec::bit_width(probe.type_code);
        let (elem_offset, intra_bit) = bits::locate(bit, width);
        let elem_addr = tag_path::normalize_array_name(base, start + elem_offset);
        let mut raw = if elem_offset == 0 {
            probe.payload
        } else {
            self.read_raw(&elem_addr, 1).await?.payload
        };
        let elem_size = (width / 8) as usize;
        if raw.len() < elem_size {
            return Err(EipError::TruncatedResponse(raw.len()));
        }
        raw.truncate(elem_size);
        bits::set_bit(&mut raw, intra_bit as usize, value);
        self.write_raw(&elem_addr, probe.type_code, 1, &raw).await
    }

    async fn fetch_bools(&self, address: &str, count: usize) -> Result<ArrayView<bool>> {
        if let Some((host, bit)) = tag_path::parse_bit_access(address) {
            return self.read_bits(host, bit, count).await;
        }
        if address.starts_with(tag_path::BIT_ACCESS_PREFIX) {
            return Err(EipError::InvalidAddress(address.to_string()));
        }
        if tag_path::parse_bit(address).is_none() {
            return self.read_bits(address, 0, count).await;
        }
        // Concrete element address: each payload byte is one boolean.
        let resp = self.read_raw(address, count as u16).await?;
        let flags: Vec<bool> = resp.payload.iter().take(count).map(|b| *b != 0).collect();
        Ok(ArrayView::new(flags, count))
    }

    /// Reads a run of bits from an integer host tag, LSB-first.
    async fn read_bits(&self, host: &str, first_bit: u32, count: usize) -> Result<ArrayView<bool>> {
        let (base, start) = tag_path::parse_array_start(host);
        let probe_addr = tag_path::normalize_array_name(base, start);
        let probe = self.read_raw(&probe_addr, 1).await?;
        let width = codec::bit_width(probe.type_code);
        let (elem_offset, intra_bit) = bits::locate(first_bit, width);
        let span = bits::spanned_elements(intra_bit, count, width);
        let resp = if elem_offset == 0 && span == 1 {
            probe
        } else {
            let run_addr = tag_path::normalize_array_name(base, start + elem_offset);
            self.read_raw(&run_addr, span as u16).await?
        };
        let flags = bits::unpack_bits(&resp.payload, intra_bit as usize, count);
        Ok(ArrayView::new(flags, count))
    }

    async fn fetch_strings(&self, address: &str, count: usize) -> Result<Vec<String>> {
        if count <= 1 && !address.contains('[') {
            let resp = self.read_raw(address, 1).await?;
            return Ok(vec![strings::decode(&resp.payload)]);
        }
        let (base, start) = tag_path::parse_array_start(address);
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let elem = tag_path::normalize_array_name(base, start + i as u32);
            let resp = self.read_raw(&elem, 1).await?;
            out.push(strings::decode(&resp.payload));
        }
        Ok(out)
    }

    async fn store_strings(&self, address: &str, values: &[&str]) -> Result<()> {
        let (base, start) = tag_path::parse_array_start(address);
        for (i, value) in values.iter().enumerate() {
            let elem = tag_path::normalize_array_name(base, start + i as u32);
            let payload = strings::encode(value);
            self.write_raw(&elem, codec::TYPE_STRING, 1, &payload).await?;
        }
        Ok(())
    }
}

/// Logs a surfaced failure with the originating address attached.
fn surface<T>(address: &str, result: Result<T>) -> Result<T> {
    if let Err(ref err) = result {
        error!("tag '{}': {}", address, err);
    }
    result
}
