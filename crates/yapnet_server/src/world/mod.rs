//! World state: players, chats and their access lists.
//!
//! This module holds plain data with no locking of its own. It is owned by
//! the event loop ([`Server`](crate::server::Server)) and only ever touched
//! from that single task, which is what keeps every mutation race-free.

mod access;

pub use access::{AccessEntry, ParseAccessEntryError};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use yapnet_protocol::Envelope;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for players. Doubles as the reconnection token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ChatId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a group of players.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    /// Reserved name of the group every authenticated player belongs to.
    pub const ANY: &'static str = "any";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The wildcard group.
    pub fn any() -> Self {
        Self::new(Self::ANY)
    }

    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("Cannot add user, username '{name}' or token is not unique!")]
    DuplicatePlayer { id: PlayerId, name: String },

    #[error("Chat '{0}' already exists")]
    DuplicateChat(ChatId),

    #[error("Cannot find the given player {0}")]
    PlayerNotFound(PlayerId),

    #[error("Cannot find target chat '{0}'")]
    ChatNotFound(ChatId),
}

// ============================================================================
// Players and chats
// ============================================================================

/// A player known to this server. Never removed, only marked offline.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub online: bool,
    pub groups: HashSet<GroupId>,
}

/// A chat lobby: its message logs and who may post into it.
#[derive(Debug, Clone, Default)]
pub struct Chat {
    messages: Vec<Envelope>,
    control_messages: Vec<Envelope>,
    access: Vec<AccessEntry>,
}

impl Chat {
    pub fn new(access: Vec<AccessEntry>) -> Self {
        Self {
            access,
            ..Default::default()
        }
    }

    /// Messages posted into this chat, oldest first.
    pub fn messages(&self) -> &[Envelope] {
        &self.messages
    }

    /// Control traffic about this chat (e.g. denied posts), oldest first.
    pub fn control_messages(&self) -> &[Envelope] {
        &self.control_messages
    }

    pub fn access(&self) -> &[AccessEntry] {
        &self.access
    }
}

// ============================================================================
// World
// ============================================================================

/// All players and chats of the running server.
#[derive(Debug, Default)]
pub struct World {
    players: HashMap<PlayerId, Player>,
    chats: HashMap<ChatId, Chat>,
}

impl World {
    /// Creates an empty world with no chats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new, online player that belongs to the wildcard group.
    ///
    /// # Errors
    ///
    /// [`WorldError::DuplicatePlayer`] if the identifier or the display name
    /// is already taken.
    pub fn add_player(&mut self, id: PlayerId, name: &str) -> Result<(), WorldError> {
        let taken = self.players.contains_key(&id)
            || self.players.values().any(|player| player.name == name);
        if taken {
            return Err(WorldError::DuplicatePlayer {
                id,
                name: name.to_string(),
            });
        }

        self.players.insert(
            id,
            Player {
                id,
                name: name.to_string(),
                online: true,
                groups: HashSet::from([GroupId::any()]),
            },
        );
        Ok(())
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn set_online(&mut self, id: PlayerId, online: bool) -> Result<(), WorldError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(WorldError::PlayerNotFound(id))?;
        player.online = online;
        Ok(())
    }

    /// Adds a player to a group. Returns `false` if they were already in it.
    pub fn add_to_group(&mut self, id: PlayerId, group: GroupId) -> Result<bool, WorldError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(WorldError::PlayerNotFound(id))?;
        Ok(player.groups.insert(group))
    }

    pub fn add_chat(&mut self, id: ChatId, access: Vec<AccessEntry>) -> Result<(), WorldError> {
        if self.chats.contains_key(&id) {
            return Err(WorldError::DuplicateChat(id));
        }
        self.chats.insert(id, Chat::new(access));
        Ok(())
    }

    pub fn chat(&self, id: &ChatId) -> Option<&Chat> {
        self.chats.get(id)
    }

    /// Chat identifiers in sorted order.
    pub fn chat_ids(&self) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self.chats.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Appends a posted message to a chat's message log.
    pub fn record_message(&mut self, chat: &ChatId, envelope: Envelope) -> Result<(), WorldError> {
        self.chat_mut(chat)?.messages.push(envelope);
        Ok(())
    }

    /// Appends an entry to a chat's control log.
    pub fn record_control(&mut self, chat: &ChatId, envelope: Envelope) -> Result<(), WorldError> {
        self.chat_mut(chat)?.control_messages.push(envelope);
        Ok(())
    }

    fn chat_mut(&mut self, chat: &ChatId) -> Result<&mut Chat, WorldError> {
        self.chats
            .get_mut(chat)
            .ok_or_else(|| WorldError::ChatNotFound(chat.clone()))
    }
}
