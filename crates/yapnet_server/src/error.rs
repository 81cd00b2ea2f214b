//! Error types for the server.
//!
//! Two families live here:
//!
//! * [`ServerError`] - faults of the server process itself (binding, config,
//!   a stopped event loop). These never reach a client.
//! * [`ClientError`] - protocol and business faults caused by a client
//!   request. Each one maps to a stable `kind` string and is answered with an
//!   Error envelope on the offending connection; none of them close it.

use serde_json::{Map, Value};
use thiserror::Error;
use yapnet_protocol::{Envelope, ErrorMessage};

/// Faults of the server process.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Network-related error (bind failures, upgrade failures, etc.)
    #[error("Network error: {0}")]
    Network(String),
    /// Invalid startup configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// The event loop is no longer accepting events
    #[error("Event loop has stopped")]
    Stopped,
    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A request the server refused. Sent back to the client as an Error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Cannot add user, username '{name}' or token is not unique!")]
    NonUniqueUsername { name: String },

    #[error("You are already connected to the server")]
    AlreadyConnected,

    #[error("The token given is not a valid token in this game")]
    InvalidToken,

    #[error("You are not logged in, so you cannot chat. Your client has not sent a Hello packet yet.")]
    NotLoggedIn,

    #[error("You do not have permissions to send to this chat.")]
    ChatPermDenied { target: String },

    #[error("{reason}")]
    ChatError { target: String, reason: String },

    #[error("The message type {0} is not a valid type.")]
    InvalidMsgType(String),
}

impl ClientError {
    /// The stable `kind` string clients match on.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::NonUniqueUsername { .. } => "NonUniqueUsername",
            ClientError::AlreadyConnected => "AlreadyConnected",
            ClientError::InvalidToken => "InvalidToken",
            ClientError::NotLoggedIn => "NotLoggedIn",
            ClientError::ChatPermDenied { .. } => "ChatPermDenied",
            ClientError::ChatError { .. } => "ChatError",
            ClientError::InvalidMsgType(_) => "InvalidMSGType",
        }
    }

    /// Structured context attached to the error.
    pub fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        match self {
            ClientError::NonUniqueUsername { name } => {
                details.insert("invalid_name".to_string(), Value::from(name.as_str()));
            }
            ClientError::ChatPermDenied { target } | ClientError::ChatError { target, .. } => {
                details.insert("target".to_string(), Value::from(target.as_str()));
            }
            ClientError::InvalidMsgType(msg_type) => {
                details.insert("invalid_type".to_string(), Value::from(msg_type.as_str()));
            }
            ClientError::AlreadyConnected | ClientError::InvalidToken | ClientError::NotLoggedIn => {}
        }
        details
    }

    pub fn to_message(&self) -> ErrorMessage {
        ErrorMessage {
            kind: self.kind().to_string(),
            info: self.to_string(),
            details: self.details(),
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        Envelope::msg(self.to_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yapnet_protocol::{MsgType, Payload};

    #[test]
    fn test_invalid_msg_type_details() {
        let err = ClientError::InvalidMsgType("zzzz".to_string());
        let message = err.to_message();
        assert_eq!(message.kind, "InvalidMSGType");
        assert_eq!(message.info, "The message type zzzz is not a valid type.");
        assert_eq!(message.details.get("invalid_type"), Some(&Value::from("zzzz")));
    }

    #[test]
    fn test_chat_errors_carry_target() {
        let denied = ClientError::ChatPermDenied {
            target: "staff".to_string(),
        };
        assert_eq!(denied.kind(), "ChatPermDenied");
        assert_eq!(denied.details().get("target"), Some(&Value::from("staff")));

        let missing = ClientError::ChatError {
            target: "nowhere".to_string(),
            reason: "Cannot find target chat 'nowhere'".to_string(),
        };
        assert_eq!(missing.kind(), "ChatError");
        assert_eq!(missing.to_string(), "Cannot find target chat 'nowhere'");
    }

    #[test]
    fn test_plain_errors_have_empty_details() {
        for err in [
            ClientError::AlreadyConnected,
            ClientError::InvalidToken,
            ClientError::NotLoggedIn,
        ] {
            assert!(err.details().is_empty(), "{err:?} should have no details");
        }
    }

    #[test]
    fn test_to_envelope() {
        let envelope = ClientError::NotLoggedIn.to_envelope();
        assert_eq!(envelope.msg_type(), MsgType::Error);
        match envelope.payload {
            Payload::Error(error) => assert_eq!(error.kind, "NotLoggedIn"),
            other => panic!("expected an error payload, got {other:?}"),
        }
    }
}
