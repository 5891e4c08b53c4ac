//! CIP / EtherNet/IP frame construction and parsing.
//!
//! Everything in this module is a pure function over byte slices; sockets and
//! session state live in [`crate::session`]. All multi-byte integers on the
//! wire are little-endian.

use crate::error::{EipError, Result};

// =========================================================================
// Wire constants
// =========================================================================

/// Encapsulation command: Register Session.
pub const CMD_REGISTER_SESSION: u16 = 0x0065;
/// Encapsulation command: UnRegister Session.
pub const CMD_UNREGISTER_SESSION: u16 = 0x0066;
/// Encapsulation command: Send RR Data.
pub const CMD_SEND_RR_DATA: u16 = 0x006F;

/// CIP service: Read Tag.
pub const SERVICE_READ_TAG: u8 = 0x4C;
/// CIP service: Write Tag.
pub const SERVICE_WRITE_TAG: u8 = 0x4D;
/// CIP service: Unconnected Send.
pub const SERVICE_UNCONNECTED_SEND: u8 = 0x52;

/// Reply service: Read Tag (0x4C + 0x80).
pub const REPLY_READ_TAG: u8 = 0xCC;
/// Reply service: Write Tag (0x4D + 0x80).
pub const REPLY_WRITE_TAG: u8 = 0xCD;
/// Reply service: Write Tag with type.
pub const REPLY_WRITE_TYPED: u8 = 0xCE;
/// Reply service: Write Tag Fragment.
pub const REPLY_WRITE_FRAGMENT: u8 = 0xD3;
/// Reply service: Multiple Service Packet; not produced by this client.
pub const REPLY_MULTI_SERVICE: u8 = 0x8A;

/// CIP general status: partial transfer, more data follows.
pub const STATUS_PARTIAL_TRANSFER: u8 = 0x06;

/// CPF item type: Unconnected Data.
const ITEM_UNCONNECTED_DATA: u16 = 0x00B2;

/// Size of the encapsulation header.
pub const ENCAP_HEADER_LEN: usize = 24;

// CIP elementary data type codes.
/// BOOL.
pub const TYPE_BOOL: u16 = 0x00C1;
/// SINT, 8-bit signed.
pub const TYPE_SINT: u16 = 0x00C2;
/// INT, 16-bit signed.
pub const TYPE_INT: u16 = 0x00C3;
/// DINT, 32-bit signed.
pub const TYPE_DINT: u16 = 0x00C4;
/// LINT, 64-bit signed.
pub const TYPE_LINT: u16 = 0x00C5;
/// USINT, 8-bit unsigned.
pub const TYPE_USINT: u16 = 0x00C6;
/// UINT, 16-bit unsigned.
pub const TYPE_UINT: u16 = 0x00C7;
/// UDINT, 32-bit unsigned.
pub const TYPE_UDINT: u16 = 0x00C8;
/// ULINT, 64-bit unsigned.
pub const TYPE_ULINT: u16 = 0x00C9;
/// REAL, 32-bit IEEE-754 float.
pub const TYPE_REAL: u16 = 0x00CA;
/// LREAL, 64-bit IEEE-754 float.
pub const TYPE_LREAL: u16 = 0x00CB;
/// STRING, length-prefixed bytes.
pub const TYPE_STRING: u16 = 0x00D0;
/// Packed bit field, 1-byte width.
pub const TYPE_BITS8: u16 = 0x00D1;
/// Packed bit field, 2-byte width.
pub const TYPE_BITS16: u16 = 0x00D2;
/// Packed bit field, 4-byte width.
pub const TYPE_BITS32: u16 = 0x00D3;
/// Packed bit field, 8-byte width.
pub const TYPE_BITS64: u16 = 0x00D4;

/// Bit width of one element of the given type code.
///
/// Unknown codes report 32 bits, the width of the most common host tags.
pub fn bit_width(type_code: u16) -> u32 {
    match type_code {
        TYPE_BOOL | TYPE_SINT | TYPE_USINT | TYPE_BITS8 => 8,
        TYPE_INT | TYPE_UINT | TYPE_BITS16 => 16,
        TYPE_DINT | TYPE_UDINT | TYPE_REAL | TYPE_BITS32 => 32,
        TYPE_LINT | TYPE_ULINT | TYPE_LREAL | TYPE_BITS64 => 64,
        _ => 32,
    }
}

// =========================================================================
// Request construction
// =========================================================================

/// Builds the 24-byte encapsulation header.
///
/// Layout: `command (u16) | length (u16) | session_handle (u32) |
/// status (u32) | sender_context (8 bytes) | options (u32)`.
fn encapsulation_header(command: u16, length: u16, session_handle: u32, context: u64) -> Vec<u8> {
    let mut frame = Vec::with_capacity(ENCAP_HEADER_LEN + length as usize);
    frame.extend_from_slice(&command.to_le_bytes());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&session_handle.to_le_bytes());
    frame.extend_from_slice(&0u32.to_le_bytes()); // status
    frame.extend_from_slice(&context.to_le_bytes()); // sender context
    frame.extend_from_slice(&0u32.to_le_bytes()); // options
    frame
}

/// Builds a Register Session frame (protocol version 1, no option flags).
pub fn register_session_frame(context: u64) -> Vec<u8> {
    let mut frame = encapsulation_header(CMD_REGISTER_SESSION, 4, 0, context);
    frame.extend_from_slice(&1u16.to_le_bytes()); // protocol version
    frame.extend_from_slice(&0u16.to_le_bytes()); // option flags
    frame
}

/// Builds an UnRegister Session frame for the given session handle.
pub fn unregister_session_frame(session_handle: u32, context: u64) -> Vec<u8> {
    let mut frame = encapsulation_header(CMD_UNREGISTER_SESSION, 4, session_handle, context);
    frame.extend_from_slice(&1u16.to_le_bytes());
    frame.extend_from_slice(&0u16.to_le_bytes());
    frame
}

/// Wraps a CIP service in an Unconnected Send (0x52) addressed to the
/// Connection Manager, appending the backplane route path.
pub fn wrap_unconnected_send(message: &[u8], route: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + message.len() + route.len());
    out.push(SERVICE_UNCONNECTED_SEND);
    out.push(0x02); // request path size in words
    out.extend_from_slice(&[0x20, 0x06, 0x24, 0x01]); // Connection Manager, class 6 instance 1
    out.push(0x0A); // priority / tick time
    out.extend_from_slice(&[0xF0, 0x00]); // timeout ticks
    out.extend_from_slice(&(message.len() as u16).to_le_bytes());
    out.extend_from_slice(message);
    if message.len() % 2 != 0 {
        out.push(0x00);
    }
    let pad_route = route.len() % 2 != 0;
    let route_words = (route.len() + pad_route as usize) / 2;
    out.push(route_words as u8);
    out.extend_from_slice(route);
    if pad_route {
        out.push(0x00);
    }
    out
}

/// Builds a complete Send RR Data frame around a CIP service.
///
/// The common packet format carries one Null Address item and one
/// Unconnected Data item holding the routed service.
pub fn send_rr_data_frame(
    session_handle: u32,
    context: u64,
    service: &[u8],
    route: &[u8],
) -> Vec<u8> {
    let routed = wrap_unconnected_send(service, route);
    let body_len = 16 + routed.len();
    let mut frame =
        encapsulation_header(CMD_SEND_RR_DATA, body_len as u16, session_handle, context);
    frame.extend_from_slice(&0u32.to_le_bytes()); // interface handle
    frame.extend_from_slice(&10u16.to_le_bytes()); // timeout
    frame.extend_from_slice(&2u16.to_le_bytes()); // item count
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // null address item
    frame.extend_from_slice(&ITEM_UNCONNECTED_DATA.to_le_bytes());
    frame.extend_from_slice(&(routed.len() as u16).to_le_bytes());
    frame.extend_from_slice(&routed);
    frame
}

/// Encodes a tag address as a symbolic request path.
///
/// Each dotted segment becomes an ANSI extended symbol segment
/// (`0x91 | len | name`, padded to even length); bracketed indices become
/// logical element segments sized to the index value.
pub fn symbolic_path(address: &str) -> Result<Vec<u8>> {
    let mut path = Vec::with_capacity(address.len() + 8);
    for segment in address.split('.') {
        let (name, indices) = match split_segment(segment) {
            Some(parts) => parts,
            // Unreadable bracket content: the whole segment is a literal name.
            None => (segment, Vec::new()),
        };
        if name.is_empty() {
            return Err(EipError::InvalidAddress(address.to_string()));
        }
        if name.len() > u8::MAX as usize {
            return Err(EipError::InvalidAddress(address.to_string()));
        }
        path.push(0x91);
        path.push(name.len() as u8);
        path.extend_from_slice(name.as_bytes());
        if name.len() % 2 != 0 {
            path.push(0x00);
        }
        for index in indices {
            if index <= u8::MAX as u32 {
                path.push(0x28);
                path.push(index as u8);
            } else if index <= u16::MAX as u32 {
                path.push(0x29);
                path.push(0x00);
                path.extend_from_slice(&(index as u16).to_le_bytes());
            } else {
                path.push(0x2A);
                path.push(0x00);
                path.extend_from_slice(&index.to_le_bytes());
            }
        }
    }
    Ok(path)
}

/// Splits `NAME[a][b]...` into the name and its indices.
///
/// `None` means the bracket content could not be read as numbers.
fn split_segment(segment: &str) -> Option<(&str, Vec<u32>)> {
    let open = match segment.find('[') {
        Some(i) => i,
        None => return Some((segment, Vec::new())),
    };
    let name = &segment[..open];
    let mut indices = Vec::new();
    let mut rest = &segment[open..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return None;
        }
        let close = rest.find(']')?;
        indices.push(rest[1..close].parse::<u32>().ok()?);
        rest = &rest[close + 1..];
    }
    Some((name, indices))
}

/// Builds a Read Tag service: `0x4C | path_size | path | element_count`.
pub fn read_request(address: &str, elements: u16) -> Result<Vec<u8>> {
    let path = symbolic_path(address)?;
    let mut req = Vec::with_capacity(4 + path.len());
    req.push(SERVICE_READ_TAG);
    req.push((path.len() / 2) as u8);
    req.extend_from_slice(&path);
    req.extend_from_slice(&elements.to_le_bytes());
    Ok(req)
}

/// Builds a Write Tag service:
/// `0x4D | path_size | path | type_code | element_count | value [| pad]`.
///
/// The trailing pad byte is emitted only for BOOL payloads of odd length.
pub fn write_request(address: &str, type_code: u16, elements: u16, value: &[u8]) -> Result<Vec<u8>> {
    let path = symbolic_path(address)?;
    let mut req = Vec::with_capacity(8 + path.len() + value.len());
    req.push(SERVICE_WRITE_TAG);
    req.push((path.len() / 2) as u8);
    req.extend_from_slice(&path);
    req.extend_from_slice(&type_code.to_le_bytes());
    req.extend_from_slice(&elements.to_le_bytes());
    req.extend_from_slice(value);
    if type_code == TYPE_BOOL && value.len() % 2 != 0 {
        req.push(0x00);
    }
    Ok(req)
}

// =========================================================================
// Response parsing
// =========================================================================

/// Decoded body of a Read Tag reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CipResponse {
    /// Raw element bytes.
    pub payload: Vec<u8>,
    /// CIP type code reported by the controller.
    pub type_code: u16,
    /// True when the controller reported a partial transfer (status 6).
    pub has_more: bool,
}

/// Encapsulation status word at offset 8 of a reply frame.
pub fn encapsulation_status(frame: &[u8]) -> Result<u32> {
    if frame.len() < ENCAP_HEADER_LEN {
        return Err(EipError::TruncatedResponse(frame.len()));
    }
    Ok(u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]))
}

/// Extracts the session handle from a Register Session reply.
pub fn parse_register_session(frame: &[u8]) -> Result<u32> {
    let status = encapsulation_status(frame)?;
    if status != 0 {
        return Err(EipError::Encapsulation(status));
    }
    Ok(u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]))
}

/// Parses a Write Tag reply, checking both protocol layers.
pub fn parse_write_response(frame: &[u8]) -> Result<()> {
    let status = encapsulation_status(frame)?;
    if status != 0 {
        return Err(EipError::Encapsulation(status));
    }
    if frame.len() >= 43 {
        let service = frame[40];
        let cip_status = frame[42];
        let service_ok = matches!(
            service,
            REPLY_WRITE_TAG | REPLY_WRITE_TYPED | REPLY_WRITE_FRAGMENT
        );
        if !service_ok || cip_status != 0 {
            return Err(EipError::WriteFailed(cip_status));
        }
    }
    Ok(())
}

/// Parses a Read Tag reply, checking both protocol layers and extracting the
/// typed payload.
pub fn parse_read_response(frame: &[u8]) -> Result<CipResponse> {
    let status = encapsulation_status(frame)?;
    if status != 0 {
        return Err(EipError::Encapsulation(status));
    }
    if frame.len() < 44 {
        return Err(EipError::TruncatedResponse(frame.len()));
    }
    let service = frame[40];
    if service == REPLY_MULTI_SERVICE {
        return Err(EipError::UnsupportedService(service));
    }
    let cip_status = frame[42];
    let has_more = cip_status == STATUS_PARTIAL_TRANSFER;
    if cip_status != 0 && !has_more {
        return Err(EipError::ReadFailed(cip_status));
    }
    if frame.len() < 46 {
        return Err(EipError::TruncatedResponse(frame.len()));
    }
    let item_length = u16::from_le_bytes([frame[38], frame[39]]) as usize;
    let type_code = u16::from_le_bytes([frame[44], frame[45]]);
    let data_len = item_length.saturating_sub(6);
    let start = 46;
    let end = (46 + data_len).min(frame.len());
    Ok(CipResponse {
        payload: frame[start..end].to_vec(),
        type_code,
        has_more,
    })
}
