//! Wire protocol for client-server communication
//!
//! MessagePack payloads framed with a 4-byte big-endian length prefix.
//! The event taxonomy lives in [`message`]; this module owns serialization,
//! framing, and version negotiation.

mod message;

pub use message::{ClientMessage, CursorPosition, Participant, ServerMessage};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum message size to prevent unbounded frames (10 MB)
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Protocol version mismatch: client={client}, server={server}")]
    VersionMismatch { client: u32, server: u32 },

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u32, max: u32 },
}

/// Serialize a message to MessagePack bytes
pub fn serialize<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(msg)?)
}

/// Deserialize a message from MessagePack bytes
pub fn deserialize<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| anyhow!(ProtocolError::MalformedMessage(e.to_string())))
}

/// Frame a payload with its length prefix for streaming.
///
/// Frame format: [4-byte length BE][payload]
pub fn frame_message(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u32;
    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// Check if client and server protocol versions are compatible
pub fn check_version_compatibility(client_version: u32, server_version: u32) -> Result<()> {
    if client_version != server_version {
        bail!(ProtocolError::VersionMismatch {
            client: client_version,
            server: server_version
        });
    }
    Ok(())
}
