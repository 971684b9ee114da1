//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (V1 - Simple Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: CREATE - Payload: collection + document JSON
//! - 0x02: VIEW   - Payload: collection + id (8)
//! - 0x03: UPDATE - Payload: collection + id (8) + partial document JSON
//! - 0x04: DELETE - Payload: collection + id (8)
//! - 0x05: FIND   - Payload: collection + field + value JSON
//! - 0x06: PING   - Payload: empty
//!
//! Strings are `len (4) + UTF-8 bytes`; JSON always runs to the end of the
//! payload.
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK        - Payload: result JSON
//! - 0x01: NOT_FOUND - Payload: message
//! - 0x02: ERROR     - Payload: message

mod codec;
mod command;
mod response;

pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use command::{Command, CommandType};
pub use response::{Response, Status};
