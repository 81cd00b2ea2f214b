//! Connection management for client connections.
//!
//! This module handles the lifecycle of client connections: the handle a
//! session registers with the event loop, the registry entry the loop keeps
//! per connection, and the two I/O loops each connection runs.

pub mod client;
pub mod session;

pub use client::ClientConnection;
pub use session::start_session;

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use yapnet_protocol::Envelope;

/// Identifier of a live connection, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Allocates a fresh identifier.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a session hands the event loop when it comes up.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub remote_addr: Option<SocketAddr>,
    /// Sending half of the connection's outbound mailbox
    pub mailbox: mpsc::Sender<Envelope>,
}

/// Why a connection went away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisconnectReason {
    #[error("closed by peer")]
    Closed,
    #[error("keepalive timed out")]
    Timeout,
    #[error("frame of {0} bytes exceeds the size limit")]
    FrameTooLarge(usize),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("server stopped")]
    ServerStopped,
}
