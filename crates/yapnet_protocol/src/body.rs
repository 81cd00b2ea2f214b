//! Payload shapes for every registered message type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Protocol version announced in every Welcome.
pub const PROTOCOL_VERSION: &str = "1";

/// Number of chat messages carried by one RecapChunk.
pub const RECAP_CHUNK_SIZE: usize = 64;

// ============================================================================
// Introduction
// ============================================================================

/// Opens the exchange. Sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<String>,
}

/// Re-authenticates a returning player using the token from an earlier
/// Welcome. Sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Back {
    pub token: Uuid,
    #[serde(default)]
    pub versions: Vec<String>,
}

/// Answer to a Hello or a Back carrying the authentication information.
/// Sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    pub name: String,
    pub token: Uuid,
    pub version: String,
}

// ============================================================================
// Chat
// ============================================================================

/// A client wants to post into a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSend {
    pub chat_content: String,
    pub chat_target: String,
}

/// Sent by the server to every other member of a chat after a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSent {
    pub sender: String,
    pub chat_content: String,
    pub chat_target: String,
}

// ============================================================================
// Errors and misc
// ============================================================================

/// The server's answer to a client going off-protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub kind: String,
    pub info: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// Loopback payload. Whatever object the client sends comes back unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Echo(pub Map<String, Value>);

/// Payload of a message whose tag is not registered.
///
/// `msg_type` keeps the tag the sender used; it is not written back to the
/// wire, an encoded `Invalid` always carries the `invd` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Invalid {
    pub msg_type: String,
    pub data: Value,
}

// ============================================================================
// Recap
// ============================================================================

/// Announces how many chat messages the following chunks will replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecapStart {
    pub chat_target: String,
    pub messages_count: u64,
    pub chunk_size: u64,
}

/// One slice of a chat's message log, starting at `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecapChunk {
    pub chat_target: String,
    pub start: u64,
    pub msgs: Vec<Value>,
}
