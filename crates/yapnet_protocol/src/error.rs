//! Errors raised while decoding or encoding envelopes.

use crate::MsgType;
use thiserror::Error;

/// Failure to turn bytes into an [`Envelope`](crate::Envelope) or back.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope must be a JSON object")]
    NotAnObject,

    #[error("unable to find '{0}' field in message")]
    MissingField(&'static str),

    #[error("field '{field}' is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("invalid '{msg_type}' payload: {source}")]
    Payload {
        msg_type: MsgType,
        #[source]
        source: serde_json::Error,
    },
}
