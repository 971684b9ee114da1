//! Response definitions
//!
//! Represents responses to clients.

use serde_json::Value;

use crate::error::{Result, StoreError};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (result JSON for OK, message otherwise)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response carrying a JSON result
    pub fn ok(result: &Value) -> Result<Self> {
        Ok(Self {
            status: Status::Ok,
            payload: Some(serde_json::to_vec(result)?),
        })
    }

    /// Create a NOT_FOUND response
    pub fn not_found(message: &str) -> Self {
        Self {
            status: Status::NotFound,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Map an engine result onto a response
    ///
    /// Missing records and unknown collections become NOT_FOUND; anything
    /// else is an ERROR.
    pub fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self::ok(&value).unwrap_or_else(|e| Self::error(&e.to_string())),
            Err(e @ StoreError::NotFound { .. }) | Err(e @ StoreError::UnknownCollection(_)) => {
                Self::not_found(&e.to_string())
            }
            Err(e) => Self::error(&e.to_string()),
        }
    }

    /// Parse the JSON result of an OK response
    pub fn json(&self) -> Result<Value> {
        match (&self.status, &self.payload) {
            (Status::Ok, Some(payload)) => Ok(serde_json::from_slice(payload)?),
            (Status::Ok, None) => Ok(Value::Null),
            _ => Err(StoreError::Protocol(format!(
                "{:?} response has no JSON result",
                self.status
            ))),
        }
    }

    /// Payload as text (messages of NOT_FOUND / ERROR responses)
    pub fn message(&self) -> String {
        self.payload
            .as_deref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .unwrap_or_default()
    }
}
