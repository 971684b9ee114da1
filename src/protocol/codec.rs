//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Payload by Command Type
//! - CREATE: collection + document JSON
//! - VIEW:   collection + id (8 bytes)
//! - UPDATE: collection + id (8 bytes) + partial JSON
//! - DELETE: collection + id (8 bytes)
//! - FIND:   collection + field + value JSON
//! - PING:   empty
//!
//! Strings are encoded as `len (4 bytes) + bytes`. All integers big-endian.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;

use super::{Command, CommandType, Response, Status};
use crate::codec::{self as doc_codec, Document};
use crate::error::{Result, StoreError};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let mut payload = BytesMut::new();

    match command {
        Command::Create {
            collection,
            document,
        } => {
            put_str(&mut payload, collection);
            put_json(&mut payload, document)?;
        }
        Command::View { collection, id } | Command::Delete { collection, id } => {
            put_str(&mut payload, collection);
            payload.put_u64(*id);
        }
        Command::Update {
            collection,
            id,
            partial,
        } => {
            put_str(&mut payload, collection);
            payload.put_u64(*id);
            put_json(&mut payload, partial)?;
        }
        Command::Find {
            collection,
            field,
            value,
        } => {
            put_str(&mut payload, collection);
            put_str(&mut payload, field);
            put_json(&mut payload, value)?;
        }
        Command::Ping => {}
    }

    Ok(frame(command.command_type() as u8, &payload))
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, payload) = split_frame(bytes, "command")?;

    let cmd_type = CommandType::from_byte(cmd_type).ok_or_else(|| {
        StoreError::Protocol(format!("Unknown command type: 0x{:02x}", cmd_type))
    })?;

    let mut reader = PayloadReader::new(payload, cmd_type);
    let command = match cmd_type {
        CommandType::Create => Command::Create {
            collection: reader.string()?,
            document: reader.document()?,
        },
        CommandType::View => Command::View {
            collection: reader.string()?,
            id: reader.u64()?,
        },
        CommandType::Update => Command::Update {
            collection: reader.string()?,
            id: reader.u64()?,
            partial: reader.document()?,
        },
        CommandType::Delete => Command::Delete {
            collection: reader.string()?,
            id: reader.u64()?,
        },
        CommandType::Find => Command::Find {
            collection: reader.string()?,
            field: reader.string()?,
            value: reader.json()?,
        },
        CommandType::Ping => Command::Ping,
    };

    reader.finish()?;
    Ok(command)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response")?;

    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::Error,
        _ => {
            return Err(StoreError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let message = read_frame(reader)?;
    decode_command(&message)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_frame(reader)?;
    decode_response(&message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Framing
// =============================================================================

fn frame(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(kind);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    message.to_vec()
}

/// Split a full message into its kind byte and payload
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let kind = header.get_u8();
    let payload_len = header.get_u32() as usize;

    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(StoreError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(StoreError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((kind, &bytes[HEADER_SIZE..total_len]))
}

/// Read header + payload from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = (&header[1..]).get_u32() as usize;
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(StoreError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = vec![0u8; HEADER_SIZE + payload_len];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;

    Ok(message)
}

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn put_json<T: serde::Serialize>(buf: &mut BytesMut, value: &T) -> Result<()> {
    buf.put_slice(&serde_json::to_vec(value)?);
    Ok(())
}

/// Cursor over a command payload with bounds-checked reads
struct PayloadReader<'a> {
    buf: &'a [u8],
    cmd_type: CommandType,
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8], cmd_type: CommandType) -> Self {
        Self { buf, cmd_type }
    }

    fn string(&mut self) -> Result<String> {
        if self.buf.remaining() < 4 {
            return Err(self.error("missing string length"));
        }
        let len = self.buf.get_u32() as usize;

        if self.buf.remaining() < len {
            return Err(self.error(&format!(
                "incomplete string (expected {}, got {})",
                len,
                self.buf.remaining()
            )));
        }
        let (text, rest) = self.buf.split_at(len);
        self.buf = rest;

        String::from_utf8(text.to_vec()).map_err(|_| self.error("string is not UTF-8"))
    }

    fn u64(&mut self) -> Result<u64> {
        if self.buf.remaining() < 8 {
            return Err(self.error("missing id"));
        }
        Ok(self.buf.get_u64())
    }

    /// Rest of the payload as JSON
    fn json(&mut self) -> Result<Value> {
        let value = serde_json::from_slice(self.buf)
            .map_err(|e| self.error(&format!("invalid JSON: {}", e)))?;
        self.buf = &[];
        Ok(value)
    }

    fn document(&mut self) -> Result<Document> {
        let value = self.json()?;
        doc_codec::into_document(value)
    }

    fn finish(&self) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(self.error(&format!(
                "unexpected {} trailing bytes",
                self.buf.len()
            )));
        }
        Ok(())
    }

    fn error(&self, detail: &str) -> StoreError {
        StoreError::Protocol(format!("{:?} command: {}", self.cmd_type, detail))
    }
}
