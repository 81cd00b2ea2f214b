//! Per-message-type handlers.
//!
//! A connection starts unauthenticated; only Hello and Back bind it to a
//! player. Every refusal is answered with an Error envelope on the
//! originating connection and never closes it.

use super::Server;
use crate::connection::ConnectionId;
use crate::error::ClientError;
use crate::world::{ChatId, PlayerId};
use tracing::{debug, error, info, warn};
use yapnet_protocol::{
    Back, ChatSend, ChatSent, Echo, Envelope, Hello, Payload, RecapChunk, RecapStart, Welcome,
    PROTOCOL_VERSION,
};

impl Server {
    /// Routes an envelope to the handler registered for its type.
    pub(super) async fn dispatch(&mut self, id: ConnectionId, envelope: Envelope) {
        let msg_type = envelope.msg_type();
        debug!("Handling {} from {}", msg_type, id);

        let result = match envelope.payload {
            Payload::Hello(hello) => self.handle_hello(id, hello).await,
            Payload::Back(back) => self.handle_back(id, back).await,
            Payload::Echo(echo) => self.handle_echo(id, echo).await,
            Payload::ChatSend(chat) => self.handle_chat_send(id, chat).await,
            Payload::Invalid(invalid) => Err(ClientError::InvalidMsgType(invalid.msg_type)),
            // Server-to-client types are not requests.
            Payload::Welcome(_)
            | Payload::ChatSent(_)
            | Payload::Error(_)
            | Payload::RecapStart(_)
            | Payload::RecapChunk(_) => Err(ClientError::InvalidMsgType(msg_type.tag().to_string())),
        };

        if let Err(err) = result {
            warn!("🚫 Refused {} from {}: {}", msg_type, id, err);
            self.send_to(id, err.to_envelope()).await;
        }
    }

    async fn handle_hello(&mut self, id: ConnectionId, hello: Hello) -> Result<(), ClientError> {
        let player_id = PlayerId::new();
        self.world
            .add_player(player_id, &hello.name)
            .map_err(|_| ClientError::NonUniqueUsername {
                name: hello.name.clone(),
            })?;

        info!("🎮 Player {} joined as '{}' on {}", player_id, hello.name, id);
        self.bind(id, player_id);
        self.welcome(id, player_id).await;
        self.log_roster();
        Ok(())
    }

    async fn handle_back(&mut self, id: ConnectionId, back: Back) -> Result<(), ClientError> {
        let player_id = PlayerId(back.token);

        let taken = self
            .clients
            .values()
            .any(|client| client.id != id && client.player_id == Some(player_id));
        if taken {
            return Err(ClientError::AlreadyConnected);
        }
        if self.world.player(&player_id).is_none() {
            return Err(ClientError::InvalidToken);
        }

        self.bind(id, player_id);
        self.world
            .set_online(player_id, true)
            .map_err(|_| ClientError::InvalidToken)?;

        info!("🔁 Player {} is back on {}", player_id, id);
        self.welcome(id, player_id).await;
        self.log_roster();
        Ok(())
    }

    async fn handle_echo(&mut self, id: ConnectionId, echo: Echo) -> Result<(), ClientError> {
        self.send_to(id, Envelope::msg(echo)).await;
        Ok(())
    }

    async fn handle_chat_send(&mut self, id: ConnectionId, chat: ChatSend) -> Result<(), ClientError> {
        let player_id = self.bound_player(id).ok_or(ClientError::NotLoggedIn)?;
        let target = ChatId::from(chat.chat_target.as_str());

        let chat_error = |reason: String| ClientError::ChatError {
            target: chat.chat_target.clone(),
            reason,
        };

        let allowed = self
            .world
            .can_chat(&player_id, &target)
            .map_err(|e| chat_error(e.to_string()))?;
        if !allowed {
            let denied = ClientError::ChatPermDenied {
                target: chat.chat_target.clone(),
            };
            if let Err(e) = self.world.record_control(&target, denied.to_envelope()) {
                error!("Failed to record denied post in '{}': {}", target, e);
            }
            return Err(denied);
        }

        let sender = self
            .world
            .player(&player_id)
            .map(|player| player.name.clone())
            .ok_or_else(|| chat_error(format!("Cannot find the given player {player_id}")))?;

        let sent = ChatSent {
            sender,
            chat_content: chat.chat_content.clone(),
            chat_target: chat.chat_target.clone(),
        };
        match self.chat_send(&target, id, Envelope::msg(sent)).await {
            Ok(delivered) => {
                debug!("💬 {} posted in '{}', delivered to {}", player_id, target, delivered);
                Ok(())
            }
            Err(e) => {
                error!("Broadcast into '{}' aborted: {}", target, e);
                Err(chat_error(e.to_string()))
            }
        }
    }

    /// Binds a connection to a player. A player previously bound to the same
    /// connection is marked offline.
    fn bind(&mut self, id: ConnectionId, player_id: PlayerId) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        let previous = client.player_id.replace(player_id);

        if let Some(previous) = previous.filter(|previous| *previous != player_id) {
            if let Err(e) = self.world.set_online(previous, false) {
                error!("Connection {} was bound to an unknown player: {}", id, e);
            }
        }
    }

    async fn welcome(&mut self, id: ConnectionId, player_id: PlayerId) {
        let Some(player) = self.world.player(&player_id) else {
            return;
        };
        let welcome = Welcome {
            name: player.name.clone(),
            token: player_id.0,
            version: PROTOCOL_VERSION.to_string(),
        };
        self.send_to(id, Envelope::msg(welcome)).await;

        if self.config.recap_on_welcome {
            self.send_recap(id, player_id).await;
        }
    }

    /// Replays the message log of every chat the player can access.
    async fn send_recap(&mut self, id: ConnectionId, player_id: PlayerId) {
        let chunk_size = self.config.recap_chunk_size.max(1);
        let mut outgoing = Vec::new();

        for chat_id in self.world.chat_ids() {
            if !matches!(self.world.can_chat(&player_id, &chat_id), Ok(true)) {
                continue;
            }
            let Some(chat) = self.world.chat(&chat_id) else {
                continue;
            };

            let messages = chat.messages();
            outgoing.push(Envelope::msg(RecapStart {
                chat_target: chat_id.to_string(),
                messages_count: messages.len() as u64,
                chunk_size: chunk_size as u64,
            }));

            for (index, chunk) in messages.chunks(chunk_size).enumerate() {
                let mut msgs = Vec::with_capacity(chunk.len());
                for message in chunk {
                    match message.to_value() {
                        Ok(value) => msgs.push(value),
                        Err(e) => error!("Failed to encode recap entry for '{}': {}", chat_id, e),
                    }
                }
                outgoing.push(Envelope::msg(RecapChunk {
                    chat_target: chat_id.to_string(),
                    start: (index * chunk_size) as u64,
                    msgs,
                }));
            }
        }

        for envelope in outgoing {
            self.send_to(id, envelope).await;
        }
    }
}
