//! Command definitions
//!
//! Represents commands from clients.

use serde_json::Value;

use crate::codec::Document;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Create = 0x01,
    View = 0x02,
    Update = 0x03,
    Delete = 0x04,
    Find = 0x05,
    Ping = 0x06,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Create),
            0x02 => Some(CommandType::View),
            0x03 => Some(CommandType::Update),
            0x04 => Some(CommandType::Delete),
            0x05 => Some(CommandType::Find),
            0x06 => Some(CommandType::Ping),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Store a new document
    Create { collection: String, document: Document },

    /// Get a document by id
    View { collection: String, id: u64 },

    /// Merge fields into an existing document
    Update {
        collection: String,
        id: u64,
        partial: Document,
    },

    /// Remove a document
    Delete { collection: String, id: u64 },

    /// Documents whose `field` equals `value`
    Find {
        collection: String,
        field: String,
        value: Value,
    },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Create { .. } => CommandType::Create,
            Command::View { .. } => CommandType::View,
            Command::Update { .. } => CommandType::Update,
            Command::Delete { .. } => CommandType::Delete,
            Command::Find { .. } => CommandType::Find,
            Command::Ping => CommandType::Ping,
        }
    }

    /// Collection the command addresses, if any
    pub fn collection(&self) -> Option<&str> {
        match self {
            Command::Create { collection, .. }
            | Command::View { collection, .. }
            | Command::Update { collection, .. }
            | Command::Delete { collection, .. }
            | Command::Find { collection, .. } => Some(collection),
            Command::Ping => None,
        }
    }
}
