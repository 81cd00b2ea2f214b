//! Message type discriminators.
//!
//! Each message kind has a stable four-letter-ish tag that is written into the
//! `msg_type` field of every envelope.

use std::fmt;

/// The kind of payload carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    /// Client: first time join
    Hello,
    /// Client: reconnect with a previously issued token
    Back,
    /// Server: answer to Hello or Back
    Welcome,
    /// Both: loopback
    Echo,
    /// Client: post into a chat
    ChatSend,
    /// Server: someone posted into a chat
    ChatSent,
    /// Server: the request went wrong
    Error,
    /// Both: fallback for unknown tags
    Invalid,
    /// Server: start of a chat history replay
    RecapStart,
    /// Server: one slice of a chat history replay
    RecapChunk,
}

impl MsgType {
    /// Every registered message type, in declaration order.
    pub const ALL: [MsgType; 10] = [
        MsgType::Hello,
        MsgType::Back,
        MsgType::Welcome,
        MsgType::Echo,
        MsgType::ChatSend,
        MsgType::ChatSent,
        MsgType::Error,
        MsgType::Invalid,
        MsgType::RecapStart,
        MsgType::RecapChunk,
    ];

    /// Returns the wire tag for this message type.
    pub fn tag(self) -> &'static str {
        match self {
            MsgType::Hello => "helo",
            MsgType::Back => "back",
            MsgType::Welcome => "welc",
            MsgType::Echo => "echo",
            MsgType::ChatSend => "chas",
            MsgType::ChatSent => "char",
            MsgType::Error => "err",
            MsgType::Invalid => "invd",
            MsgType::RecapStart => "rech",
            MsgType::RecapChunk => "recx",
        }
    }

    /// Looks up the message type registered for a wire tag.
    ///
    /// Returns `None` for tags that are not part of the protocol.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|msg_type| msg_type.tag() == tag)
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
