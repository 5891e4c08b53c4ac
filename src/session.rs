//! Session transport: one TCP connection, one registered CIP session.
//!
//! The session is opened lazily on the first request and re-established at
//! most once per failing request when the controller reports a stale or
//! oversize encapsulation status. Exactly one request is in flight at a time;
//! the owning client serializes callers with a mutex.

use std::io;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::codec;
use crate::error::{EipError, Result};

/// EtherNet/IP explicit-messaging TCP port.
pub const DEFAULT_PORT: u16 = 44818;

/// Default per-operation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Encapsulation statuses observed from controllers when the session handle
/// has gone stale or the request exceeded the peer's length limit. Both
/// trigger one re-register-and-resend; confirm against the vendor list
/// before widening.
pub(crate) const RETRY_ENCAP_CODES: [u32; 2] = [3, 101];

pub(crate) fn is_retryable(status: u32) -> bool {
    RETRY_ENCAP_CODES.contains(&status)
}

/// Connection state for one PLC target.
#[derive(Debug)]
pub(crate) struct Session {
    host: String,
    port: u16,
    route: Vec<u8>,
    timeout: Duration,
    stream: Option<TcpStream>,
    session_handle: u32,
    context: u64,
    // Set while bytes may be in flight; a request future dropped mid-exchange
    // leaves the stream unframed, so the next request starts clean.
    dirty: bool,
}

impl Session {
    pub(crate) fn new(host: String, port: u16, route: Vec<u8>, timeout: Duration) -> Self {
        Self {
            host,
            port,
            route,
            timeout,
            stream: None,
            session_handle: 0,
            context: 0,
            dirty: false,
        }
    }

    pub(crate) fn handle(&self) -> u32 {
        self.session_handle
    }

    /// Sends one CIP service and returns the complete reply frame.
    ///
    /// A stale/oversize encapsulation status tears the session down and
    /// resends the identical request exactly once; any second failure
    /// surfaces to the caller.
    pub(crate) async fn transact(&mut self, service: &[u8]) -> Result<Vec<u8>> {
        let frame = self.exchange(service).await?;
        let status = codec::encapsulation_status(&frame)?;
        if status == 0 {
            return Ok(frame);
        }
        self.teardown();
        if !is_retryable(status) {
            return Err(EipError::Encapsulation(status));
        }
        debug!(
            "encapsulation status {} from {}, re-registering and resending",
            status, self.host
        );
        let frame = self.exchange(service).await?;
        let status = codec::encapsulation_status(&frame)?;
        if status != 0 {
            self.teardown();
            return Err(EipError::Encapsulation(status));
        }
        Ok(frame)
    }

    /// Deliberate close: best-effort UnRegister Session, then drop the socket.
    pub(crate) async fn close(&mut self) {
        if self.stream.is_some() && self.session_handle != 0 {
            self.context = self.context.wrapping_add(1);
            let frame = codec::unregister_session_frame(self.session_handle, self.context);
            let _ = self.send_frame(&frame).await;
        }
        self.teardown();
    }

    async fn exchange(&mut self, service: &[u8]) -> Result<Vec<u8>> {
        if self.dirty {
            self.teardown();
        }
        self.ensure_open().await?;
        self.context = self.context.wrapping_add(1);
        let frame =
            codec::send_rr_data_frame(self.session_handle, self.context, service, &self.route);
        self.dirty = true;
        self.send_frame(&frame).await?;
        let reply = self.recv_frame().await?;
        self.dirty = false;
        Ok(reply)
    }

    async fn ensure_open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let addr = format!("{}:{}", self.host, self.port);
        let stream = match timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(EipError::ConnectFailed { addr, source }),
            Err(_) => return Err(EipError::Timeout(self.timeout)),
        };
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        self.session_handle = 0;

        self.context = self.context.wrapping_add(1);
        let frame = codec::register_session_frame(self.context);
        self.send_frame(&frame).await?;
        let reply = self.recv_frame().await?;
        match codec::parse_register_session(&reply) {
            Ok(handle) => {
                self.session_handle = handle;
                debug!("session registered with {}, handle 0x{:08X}", addr, handle);
                Ok(())
            }
            Err(err) => {
                self.teardown();
                Err(err)
            }
        }
    }

    fn teardown(&mut self) {
        self.stream = None;
        self.session_handle = 0;
        self.dirty = false;
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        let deadline = self.timeout;
        let stream = self.stream.as_mut().ok_or(EipError::ConnectionClosed)?;
        match timeout(deadline, stream.write_all(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.teardown();
                Err(EipError::Io(err))
            }
            Err(_) => {
                self.teardown();
                Err(EipError::Timeout(deadline))
            }
        }
    }

    async fn recv_frame(&mut self) -> Result<Vec<u8>> {
        let deadline = self.timeout;
        let stream = self.stream.as_mut().ok_or(EipError::ConnectionClosed)?;
        match timeout(deadline, read_frame(stream)).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                self.teardown();
                Err(EipError::ConnectionClosed)
            }
            Ok(Err(err)) => {
                self.teardown();
                Err(EipError::Io(err))
            }
            Err(_) => {
                self.teardown();
                Err(EipError::Timeout(deadline))
            }
        }
    }
}

/// Reads one encapsulation frame: the fixed header, then exactly the body
/// length the header declares.
async fn read_frame(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut header = [0u8; codec::ENCAP_HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let body_len = u16::from_le_bytes([header[2], header[3]]) as usize;
    let mut frame = header.to_vec();
    if body_len > 0 {
        frame.resize(codec::ENCAP_HEADER_LEN + body_len, 0);
        stream.read_exact(&mut frame[codec::ENCAP_HEADER_LEN..]).await?;
    }
    Ok(frame)
}
