#![allow(dead_code)] // each test binary uses its own subset of the harness

//! In-process PLC endpoint for integration tests.
//!
//! Speaks just enough EtherNet/IP to serve this crate's client: session
//! registration, Read Tag and Write Tag inside Unconnected Send, plus fault
//! injection (oversize rejection, one-shot stale-session status). Every
//! request is recorded so tests can assert on chunk sizes and retries.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use eip_tags::ClientConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One stored tag: a type code and per-element raw bytes.
pub struct Tag {
    pub type_code: u16,
    pub elements: Vec<Vec<u8>>,
}

#[derive(Default)]
pub struct PlcState {
    pub tags: HashMap<String, Tag>,
    /// Every write service seen, including rejected ones: `(address, count)`.
    pub write_attempts: Vec<(String, u16)>,
    /// Writes that were applied.
    pub write_accepted: Vec<(String, u16)>,
    /// Every read service seen: `(address, count)`.
    pub read_requests: Vec<(String, u16)>,
    /// Reject write services with more elements than this, encapsulation
    /// status 3.
    pub reject_write_over: Option<u16>,
    /// Answer the next SendRRData with encapsulation status 3, once.
    pub fail_next_rr: bool,
    /// Session handles issued, in order.
    pub handles: Vec<u32>,
    next_handle: u32,
}

impl PlcState {
    pub fn set_dint_array(&mut self, name: &str, values: &[i32]) {
        self.tags.insert(
            name.to_string(),
            Tag {
                type_code: 0x00C4,
                elements: values.iter().map(|v| v.to_le_bytes().to_vec()).collect(),
            },
        );
    }

    pub fn set_int_array(&mut self, name: &str, values: &[i16]) {
        self.tags.insert(
            name.to_string(),
            Tag {
                type_code: 0x00C3,
                elements: values.iter().map(|v| v.to_le_bytes().to_vec()).collect(),
            },
        );
    }

    pub fn dint(&self, name: &str, index: usize) -> i32 {
        let e = &self.tags[name].elements[index];
        i32::from_le_bytes([e[0], e[1], e[2], e[3]])
    }

    pub fn int(&self, name: &str, index: usize) -> i16 {
        let e = &self.tags[name].elements[index];
        i16::from_le_bytes([e[0], e[1]])
    }

    pub fn element(&self, name: &str, index: usize) -> Vec<u8> {
        self.tags[name].elements[index].clone()
    }
}

pub struct MockPlc {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<PlcState>>,
}

impl MockPlc {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state: Arc<Mutex<PlcState>> = Arc::new(Mutex::new(PlcState::default()));
        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let conn_state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, conn_state).await;
                });
            }
        });
        Self { addr, state }
    }

    /// Client configuration pointed at this endpoint.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.addr.ip().to_string()).with_port(self.addr.port())
    }
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<PlcState>>) -> std::io::Result<()> {
    let mut session_handle = 0u32;
    loop {
        let mut header = [0u8; 24];
        if stream.read_exact(&mut header).await.is_err() {
            return Ok(());
        }
        let command = u16::from_le_bytes([header[0], header[1]]);
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;
        let mut body = vec![0u8; len];
        if len > 0 {
            stream.read_exact(&mut body).await?;
        }
        match command {
            // Register Session
            0x0065 => {
                let handle = {
                    let mut st = state.lock().unwrap();
                    st.next_handle += 1;
                    let h = st.next_handle;
                    st.handles.push(h);
                    h
                };
                session_handle = handle;
                let mut reply = encap_header(0x0065, 4, handle, 0, &header[12..20]);
                reply.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
                stream.write_all(&reply).await?;
            }
            // UnRegister Session: no reply, connection is done
            0x0066 => return Ok(()),
            // Send RR Data
            0x006F => {
                let reply = handle_rr_data(&state, session_handle, &header, &body);
                stream.write_all(&reply).await?;
            }
            _ => return Ok(()),
        }
    }
}

fn encap_header(command: u16, len: u16, handle: u32, status: u32, context: &[u8]) -> Vec<u8> {
    let mut h = Vec::with_capacity(24 + len as usize);
    h.extend_from_slice(&command.to_le_bytes());
    h.extend_from_slice(&len.to_le_bytes());
    h.extend_from_slice(&handle.to_le_bytes());
    h.extend_from_slice(&status.to_le_bytes());
    h.extend_from_slice(context);
    h.extend_from_slice(&[0u8; 4]);
    h
}

fn handle_rr_data(
    state: &Arc<Mutex<PlcState>>,
    handle: u32,
    header: &[u8],
    body: &[u8],
) -> Vec<u8> {
    let context = &header[12..20];
    let mut st = state.lock().unwrap();
    if st.fail_next_rr {
        st.fail_next_rr = false;
        return encap_header(0x006F, 0, handle, 3, context);
    }
    // CPF: interface(4) timeout(2) count(2) null item(4) | B2 type(2) len(2) data
    let data = &body[16..];
    // Unconnected Send: 52, path words, 4-byte path, priority, 2 timeout
    // bytes, message length, message.
    let msg_len = u16::from_le_bytes([data[9], data[10]]) as usize;
    let msg = &data[11..11 + msg_len];
    let cip_reply = match msg[0] {
        0x4C => read_service(&mut st, msg),
        0x4D => match write_service(&mut st, msg) {
            Ok(reply) => reply,
            Err(status) => return encap_header(0x006F, 0, handle, status, context),
        },
        service => vec![service | 0x80, 0x00, 0x08, 0x00],
    };
    let mut frame = encap_header(0x006F, (16 + cip_reply.len()) as u16, handle, 0, context);
    frame.extend_from_slice(&0u32.to_le_bytes()); // interface handle
    frame.extend_from_slice(&10u16.to_le_bytes()); // timeout
    frame.extend_from_slice(&2u16.to_le_bytes()); // item count
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // null address item
    frame.extend_from_slice(&0x00B2u16.to_le_bytes());
    frame.extend_from_slice(&(cip_reply.len() as u16).to_le_bytes());
    frame.extend_from_slice(&cip_reply);
    frame
}

/// Walks a symbolic request path into `(dotted_name, element_indices, end)`.
fn parse_request_path(msg: &[u8]) -> (String, Vec<u32>, usize) {
    let words = msg[1] as usize;
    let path = &msg[2..2 + words * 2];
    let mut names: Vec<String> = Vec::new();
    let mut indices = Vec::new();
    let mut i = 0;
    while i < path.len() {
        match path[i] {
            0x91 => {
                let len = path[i + 1] as usize;
                names.push(String::from_utf8_lossy(&path[i + 2..i + 2 + len]).into_owned());
                i += 2 + len + (len % 2);
            }
            0x28 => {
                indices.push(path[i + 1] as u32);
                i += 2;
            }
            0x29 => {
                indices.push(u16::from_le_bytes([path[i + 2], path[i + 3]]) as u32);
                i += 4;
            }
            0x2A => {
                indices.push(u32::from_le_bytes([
                    path[i + 2],
                    path[i + 3],
                    path[i + 4],
                    path[i + 5],
                ]));
                i += 6;
            }
            _ => break,
        }
    }
    (names.join("."), indices, 2 + words * 2)
}

fn format_addr(name: &str, indices: &[u32]) -> String {
    match indices.first() {
        Some(start) => format!("{}[{}]", name, start),
        None => name.to_string(),
    }
}

fn read_service(st: &mut PlcState, msg: &[u8]) -> Vec<u8> {
    let (name, indices, after) = parse_request_path(msg);
    let count = u16::from_le_bytes([msg[after], msg[after + 1]]);
    st.read_requests.push((format_addr(&name, &indices), count));
    let start = indices.first().copied().unwrap_or(0) as usize;
    match st.tags.get(&name) {
        // Path segment error: tag does not exist.
        None => vec![0xCC, 0x00, 0x04, 0x00],
        Some(tag) => {
            let mut payload = Vec::new();
            let end = (start + count as usize).min(tag.elements.len());
            for element in &tag.elements[start.min(tag.elements.len())..end] {
                payload.extend_from_slice(element);
            }
            let mut reply = vec![0xCC, 0x00, 0x00, 0x00];
            reply.extend_from_slice(&tag.type_code.to_le_bytes());
            reply.extend_from_slice(&payload);
            reply
        }
    }
}

fn write_service(st: &mut PlcState, msg: &[u8]) -> Result<Vec<u8>, u32> {
    let (name, indices, after) = parse_request_path(msg);
    let type_code = u16::from_le_bytes([msg[after], msg[after + 1]]);
    let count = u16::from_le_bytes([msg[after + 2], msg[after + 3]]);
    let data = &msg[after + 4..];
    st.write_attempts.push((format_addr(&name, &indices), count));
    if let Some(limit) = st.reject_write_over {
        if count > limit {
            return Err(3);
        }
    }
    st.write_accepted.push((format_addr(&name, &indices), count));
    let esize = element_size(type_code, data.len(), count);
    let start = indices.first().copied().unwrap_or(0) as usize;
    let tag = st.tags.entry(name).or_insert_with(|| Tag {
        type_code,
        elements: Vec::new(),
    });
    tag.type_code = type_code;
    while tag.elements.len() < start + count as usize {
        tag.elements.push(vec![0u8; esize]);
    }
    for i in 0..count as usize {
        let lo = i * esize;
        if lo + esize <= data.len() {
            tag.elements[start + i] = data[lo..lo + esize].to_vec();
        }
    }
    Ok(vec![0xCD, 0x00, 0x00, 0x00])
}

fn element_size(type_code: u16, data_len: usize, count: u16) -> usize {
    match type_code {
        0x00C1 | 0x00C2 | 0x00C6 => 1,
        0x00C3 | 0x00C7 => 2,
        0x00C4 | 0x00C8 | 0x00CA => 4,
        0x00C5 | 0x00C9 | 0x00CB => 8,
        // Strings arrive one variable-size element per request.
        0x00D0 => data_len,
        _ => (data_len / count.max(1) as usize).max(1),
    }
}
