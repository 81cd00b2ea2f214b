//! Server configuration types and defaults.
//!
//! This module contains the configuration the event loop, the listener and
//! every connection session are started with.

use crate::world::{AccessEntry, ChatId, GroupId};
use std::net::SocketAddr;
use std::time::Duration;

/// A chat created at startup together with its access list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub name: ChatId,
    pub access: Vec<AccessEntry>,
}

impl ChatConfig {
    pub fn new(name: impl Into<ChatId>, access: Vec<AccessEntry>) -> Self {
        Self {
            name: name.into(),
            access,
        }
    }

    /// The default `general` chat everyone may post into.
    pub fn general() -> Self {
        Self::new("general", vec![AccessEntry::Group(GroupId::any())])
    }
}

/// Configuration structure for the chat server.
///
/// Contains the network settings, the per-connection keepalive and size
/// limits, queue capacities and the chats that exist from startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Largest accepted inbound frame, in bytes
    pub max_frame_size: usize,

    /// How long a connection may stay silent (no frame, no pong) before it is dropped
    pub pong_timeout: Duration,

    /// How often keepalive pings are sent. Must be shorter than `pong_timeout`.
    pub ping_period: Duration,

    /// Deadline for a single outbound write.
    ///
    /// The event loop waits for room in a full mailbox, so this also bounds
    /// how long one peer that stopped reading can stall it.
    pub write_timeout: Duration,

    /// Capacity of each connection's outbound mailbox
    pub mailbox_capacity: usize,

    /// Capacity of the shared inbound queue feeding the event loop
    pub inbound_queue_capacity: usize,

    /// Replay every accessible chat after a Welcome
    pub recap_on_welcome: bool,

    /// Messages per RecapChunk
    pub recap_chunk_size: usize,

    /// Chats created at startup
    pub chats: Vec<ChatConfig>,
}

impl ServerConfig {
    /// The limits handed to each connection session.
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            max_frame_size: self.max_frame_size,
            pong_timeout: self.pong_timeout,
            ping_period: self.ping_period,
            write_timeout: self.write_timeout,
            mailbox_capacity: self.mailbox_capacity,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let pong_timeout = Duration::from_secs(10);
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_frame_size: 1024,
            pong_timeout,
            ping_period: pong_timeout * 9 / 10,
            write_timeout: Duration::from_secs(120),
            mailbox_capacity: 64,
            inbound_queue_capacity: 256,
            recap_on_welcome: false,
            recap_chunk_size: yapnet_protocol::RECAP_CHUNK_SIZE,
            chats: vec![ChatConfig::general()],
        }
    }
}

/// Per-connection limits, copied into every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_frame_size: usize,
    pub pong_timeout: Duration,
    pub ping_period: Duration,
    pub write_timeout: Duration,
    pub mailbox_capacity: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        ServerConfig::default().session_limits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.ping_period, Duration::from_secs(9));
        assert!(config.ping_period < config.pong_timeout);
        assert!(!config.recap_on_welcome);
        assert_eq!(config.chats, vec![ChatConfig::general()]);
    }

    #[test]
    fn test_session_limits_follow_config() {
        let config = ServerConfig {
            max_frame_size: 4096,
            mailbox_capacity: 8,
            ..Default::default()
        };
        let limits = config.session_limits();
        assert_eq!(limits.max_frame_size, 4096);
        assert_eq!(limits.mailbox_capacity, 8);
        assert_eq!(limits.pong_timeout, config.pong_timeout);
    }
}
