//! Core event loop implementation.
//!
//! This module contains the [`Server`] struct, the single task that owns the
//! world and the connection registry, and the cloneable [`ServerHandle`]
//! sessions use to feed it events.

use crate::{
    config::ServerConfig,
    connection::{ClientConnection, ConnectionHandle, ConnectionId, DisconnectReason},
    error::ServerError,
    world::{ChatId, PlayerId, World, WorldError},
};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use yapnet_protocol::Envelope;

/// Something a session reported after registering.
///
/// Envelopes and disconnects share one queue so a connection's last messages
/// are handled before its departure.
#[derive(Debug)]
enum SessionEvent {
    Message(ConnectionId, Envelope),
    Disconnect(ConnectionId, DisconnectReason),
}

/// Cloneable sender side of the event loop.
///
/// Every method fails with [`ServerError::Stopped`] once the loop is gone.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    connect_tx: mpsc::Sender<ConnectionHandle>,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl ServerHandle {
    /// Reports a newly established connection.
    pub async fn connect(&self, handle: ConnectionHandle) -> Result<(), ServerError> {
        self.connect_tx
            .send(handle)
            .await
            .map_err(|_| ServerError::Stopped)
    }

    /// Queues an envelope received on `id`.
    pub async fn receive(&self, id: ConnectionId, envelope: Envelope) -> Result<(), ServerError> {
        self.events_tx
            .send(SessionEvent::Message(id, envelope))
            .await
            .map_err(|_| ServerError::Stopped)
    }

    /// Reports a lost connection, after any envelope already queued for it.
    /// Reporting the same connection twice is harmless.
    pub async fn disconnect(
        &self,
        id: ConnectionId,
        reason: DisconnectReason,
    ) -> Result<(), ServerError> {
        self.events_tx
            .send(SessionEvent::Disconnect(id, reason))
            .await
            .map_err(|_| ServerError::Stopped)
    }
}

/// The event loop.
///
/// `Server` is the only owner of the [`World`] and of the registry mapping
/// live connections to bound players. It handles one event at a time to
/// completion, so none of that state needs a lock.
///
/// # Event sources
///
/// * **connect** - a session came up; it is registered unbound
/// * **session events**, in the order sessions reported them:
///   * an envelope arrived; it is dispatched to its handler
///   * a session went away; its player is marked offline and its mailbox
///     closed
pub struct Server {
    pub(super) config: ServerConfig,
    pub(super) world: World,
    pub(super) clients: HashMap<ConnectionId, ClientConnection>,
    connect_rx: mpsc::Receiver<ConnectionHandle>,
    events_rx: mpsc::Receiver<SessionEvent>,
}

impl Server {
    /// Creates the event loop and the handle used to reach it.
    ///
    /// The chats listed in `config` are created up front.
    ///
    /// # Returns
    ///
    /// The loop (not yet running) and its handle, or [`ServerError::Config`]
    /// if two configured chats share a name.
    pub fn new(config: ServerConfig) -> Result<(Self, ServerHandle), ServerError> {
        let mut world = World::new();
        for chat in &config.chats {
            world
                .add_chat(chat.name.clone(), chat.access.clone())
                .map_err(|e| ServerError::Config(e.to_string()))?;
        }

        let capacity = config.inbound_queue_capacity.max(1);
        let (connect_tx, connect_rx) = mpsc::channel(capacity);
        let (events_tx, events_rx) = mpsc::channel(capacity);

        let server = Self {
            config,
            world,
            clients: HashMap::new(),
            connect_rx,
            events_rx,
        };
        let handle = ServerHandle {
            connect_tx,
            events_tx,
        };
        Ok((server, handle))
    }

    /// Runs until every [`ServerHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("🚀 Event loop started with {} chat(s)", self.world.chat_ids().len());
        while self.step().await {}
        info!("Event loop stopped");
    }

    /// Waits for the next event and processes it to completion.
    ///
    /// Connects are served first, so a connection is always registered before
    /// its first envelope is handled. Envelopes and disconnects are handled in
    /// the order they were reported. Returns `false` once all event sources
    /// are closed.
    pub async fn step(&mut self) -> bool {
        tokio::select! {
            biased;
            Some(handle) = self.connect_rx.recv() => self.on_connect(handle),
            Some(event) = self.events_rx.recv() => match event {
                SessionEvent::Message(id, envelope) => self.on_message(id, envelope).await,
                SessionEvent::Disconnect(id, reason) => self.on_disconnect(id, reason),
            },
            else => return false,
        }
        true
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access, for seeding groups before the loop runs.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    /// The player bound to a connection, if any.
    pub fn bound_player(&self, id: ConnectionId) -> Option<PlayerId> {
        self.clients.get(&id).and_then(|client| client.player_id)
    }

    fn on_connect(&mut self, handle: ConnectionHandle) {
        let id = handle.id;
        debug!("Registering connection {}", id);
        self.clients.insert(id, ClientConnection::new(handle));
    }

    fn on_disconnect(&mut self, id: ConnectionId, reason: DisconnectReason) {
        // Both session loops report; only the first one finds an entry.
        let Some(client) = self.clients.remove(&id) else {
            return;
        };

        match client.player_id {
            Some(player_id) => {
                if let Err(e) = self.world.set_online(player_id, false) {
                    error!("Connection {} was bound to an unknown player: {}", id, e);
                }
                info!("👋 Player {} disconnected ({}): {}", player_id, id, reason);
                self.log_roster();
            }
            None => info!("👋 Connection {} closed before login: {}", id, reason),
        }
        // Dropping the entry closes the mailbox.
    }

    async fn on_message(&mut self, id: ConnectionId, envelope: Envelope) {
        if !self.clients.contains_key(&id) {
            debug!("Ignoring {} from unregistered connection {}", envelope.msg_type(), id);
            return;
        }
        self.dispatch(id, envelope).await;
    }

    /// Broadcasts `envelope` into a chat.
    ///
    /// Appends it to the chat's message log, then enqueues it for every bound
    /// connection other than `origin` whose player may access the chat.
    /// Recipients are resolved before anything is written, so a lookup
    /// failure leaves no partial effects.
    ///
    /// # Returns
    ///
    /// The number of connections the envelope was queued for.
    pub async fn chat_send(
        &mut self,
        chat: &ChatId,
        origin: ConnectionId,
        envelope: Envelope,
    ) -> Result<usize, WorldError> {
        if self.world.chat(chat).is_none() {
            return Err(WorldError::ChatNotFound(chat.clone()));
        }

        let mut recipients = Vec::new();
        for client in self.clients.values() {
            let Some(player_id) = client.player_id else {
                continue;
            };
            if client.id == origin {
                continue;
            }
            if self.world.can_chat(&player_id, chat)? {
                recipients.push(client.id);
            }
        }

        self.world.record_message(chat, envelope.clone())?;
        for id in &recipients {
            self.send_to(*id, envelope.clone()).await;
        }
        Ok(recipients.len())
    }

    /// Enqueues an envelope on one connection's mailbox, waiting for room.
    pub(super) async fn send_to(&self, id: ConnectionId, envelope: Envelope) {
        let Some(client) = self.clients.get(&id) else {
            debug!("Dropping {} for departed connection {}", envelope.msg_type(), id);
            return;
        };
        if client.mailbox().send(envelope).await.is_err() {
            debug!("Mailbox of {} already closed", id);
        }
    }

    pub(super) fn log_roster(&self) {
        debug!(
            "👥 {} connection(s), {} player(s)",
            self.clients.len(),
            self.world.player_count()
        );
        for player in self.world.players() {
            let marker = if player.online { "🟢" } else { "⚪" };
            debug!("  {} {} ({})", marker, player.name, player.id);
        }
    }
}
