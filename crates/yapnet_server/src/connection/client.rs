//! Client connection representation.
//!
//! This module defines the registry entry the event loop keeps for every
//! live connection.

use super::{ConnectionHandle, ConnectionId};
use crate::world::PlayerId;
use std::net::SocketAddr;
use std::time::SystemTime;
use tokio::sync::mpsc;
use yapnet_protocol::Envelope;

/// Represents an individual client connection to the server.
///
/// # Fields
///
/// * `player_id` - The player bound to this connection, `None` until a Hello or Back succeeds
/// * `remote_addr` - The network address of the connected client, when known
/// * `connected_at` - Timestamp when the connection was established
#[derive(Debug)]
pub struct ClientConnection {
    pub id: ConnectionId,

    /// The player bound to this connection (None until authenticated)
    pub player_id: Option<PlayerId>,

    /// The remote network address of the client
    pub remote_addr: Option<SocketAddr>,

    /// When this connection was established
    pub connected_at: SystemTime,

    mailbox: mpsc::Sender<Envelope>,
}

impl ClientConnection {
    /// Creates an unbound registry entry from a session's handle.
    pub fn new(handle: ConnectionHandle) -> Self {
        Self {
            id: handle.id,
            player_id: None,
            remote_addr: handle.remote_addr,
            connected_at: SystemTime::now(),
            mailbox: handle.mailbox,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.player_id.is_some()
    }

    /// The outbound mailbox. Dropping the entry closes it.
    pub fn mailbox(&self) -> &mpsc::Sender<Envelope> {
        &self.mailbox
    }
}
