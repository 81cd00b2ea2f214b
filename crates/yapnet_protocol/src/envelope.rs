//! The envelope wrapping every message and its two-phase decoder.

use crate::body::{
    Back, ChatSend, ChatSent, Echo, ErrorMessage, Hello, Invalid, RecapChunk, RecapStart, Welcome,
};
use crate::{MsgType, ProtocolError, Seq};
use serde::de::{DeserializeOwned, Error as _};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A payload type that knows which message type it belongs to.
///
/// Implemented for every struct in [`body`](crate::body); used by
/// [`Envelope::msg`] to derive the tag from the payload itself.
pub trait MessageData: Into<Payload> {
    const MSG_TYPE: MsgType;
}

/// The typed content of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Hello(Hello),
    Back(Back),
    Welcome(Welcome),
    Echo(Echo),
    ChatSend(ChatSend),
    ChatSent(ChatSent),
    Error(ErrorMessage),
    Invalid(Invalid),
    RecapStart(RecapStart),
    RecapChunk(RecapChunk),
}

macro_rules! message_data {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Payload {
                fn from(value: $ty) -> Self {
                    Payload::$variant(value)
                }
            }

            impl MessageData for $ty {
                const MSG_TYPE: MsgType = MsgType::$variant;
            }
        )*
    };
}

message_data! {
    Hello => Hello,
    Back => Back,
    Welcome => Welcome,
    Echo => Echo,
    ChatSend => ChatSend,
    ChatSent => ChatSent,
    ErrorMessage => Error,
    Invalid => Invalid,
    RecapStart => RecapStart,
    RecapChunk => RecapChunk,
}

impl Payload {
    /// The message type this payload is registered under.
    pub fn msg_type(&self) -> MsgType {
        match self {
            Payload::Hello(_) => MsgType::Hello,
            Payload::Back(_) => MsgType::Back,
            Payload::Welcome(_) => MsgType::Welcome,
            Payload::Echo(_) => MsgType::Echo,
            Payload::ChatSend(_) => MsgType::ChatSend,
            Payload::ChatSent(_) => MsgType::ChatSent,
            Payload::Error(_) => MsgType::Error,
            Payload::Invalid(_) => MsgType::Invalid,
            Payload::RecapStart(_) => MsgType::RecapStart,
            Payload::RecapChunk(_) => MsgType::RecapChunk,
        }
    }

    /// Second decoding phase: materialize `data` as the type registered for
    /// `tag`. Unknown tags become [`Payload::Invalid`] and never fail.
    fn decode(tag: &str, data: Value) -> Result<Self, ProtocolError> {
        let payload = match MsgType::from_tag(tag) {
            Some(MsgType::Hello) => Payload::Hello(typed(MsgType::Hello, data)?),
            Some(MsgType::Back) => Payload::Back(typed(MsgType::Back, data)?),
            Some(MsgType::Welcome) => Payload::Welcome(typed(MsgType::Welcome, data)?),
            Some(MsgType::Echo) => Payload::Echo(typed(MsgType::Echo, data)?),
            Some(MsgType::ChatSend) => Payload::ChatSend(typed(MsgType::ChatSend, data)?),
            Some(MsgType::ChatSent) => Payload::ChatSent(typed(MsgType::ChatSent, data)?),
            Some(MsgType::Error) => Payload::Error(typed(MsgType::Error, data)?),
            Some(MsgType::RecapStart) => Payload::RecapStart(typed(MsgType::RecapStart, data)?),
            Some(MsgType::RecapChunk) => Payload::RecapChunk(typed(MsgType::RecapChunk, data)?),
            Some(MsgType::Invalid) | None => Payload::Invalid(Invalid {
                msg_type: tag.to_string(),
                data,
            }),
        };
        Ok(payload)
    }
}

fn typed<T: DeserializeOwned>(msg_type: MsgType, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::Payload { msg_type, source })
}

/// The wire unit: a message-type tag, a sequence number and a payload.
///
/// The tag is never stored separately; it is always derived from the payload,
/// so an envelope cannot carry a payload of the wrong type for its tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub seq: Seq,
    pub payload: Payload,
}

impl Envelope {
    /// Wraps a strongly-typed payload with sequence number zero.
    pub fn msg<D: MessageData>(data: D) -> Self {
        Self {
            seq: 0,
            payload: data.into(),
        }
    }

    /// Returns the envelope with its sequence number replaced.
    pub fn with_seq(mut self, seq: Seq) -> Self {
        self.seq = seq;
        self
    }

    pub fn msg_type(&self) -> MsgType {
        self.payload.msg_type()
    }

    /// Decodes a raw frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the frame is not a JSON object, if the
    /// `msg_type` or `data` fields are missing, or if the payload of a
    /// registered tag does not match its shape.
    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(raw)?;
        Self::from_value(value)
    }

    /// Decodes an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        // Phase one: only the tag and the sequence number.
        let tag = match fields.remove("msg_type") {
            Some(Value::String(tag)) => tag,
            Some(other) => {
                return Err(ProtocolError::InvalidField {
                    field: "msg_type",
                    reason: format!("expected a string, found {other}"),
                })
            }
            None => return Err(ProtocolError::MissingField("msg_type")),
        };

        let seq = match fields.get("seq") {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_u64().ok_or_else(|| ProtocolError::InvalidField {
                field: "seq",
                reason: format!("expected an unsigned integer, found {value}"),
            })?,
        };

        let data = fields
            .remove("data")
            .ok_or(ProtocolError::MissingField("data"))?;

        // Phase two: the payload, typed by the tag.
        let payload = Payload::decode(&tag, data)?;
        Ok(Self { seq, payload })
    }

    /// Encodes the envelope as a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encodes the envelope into a JSON value, e.g. to embed it in a recap.
    pub fn to_value(&self) -> Result<Value, ProtocolError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Envelope", 3)?;
        state.serialize_field("msg_type", self.msg_type().tag())?;
        state.serialize_field("seq", &self.seq)?;
        match &self.payload {
            Payload::Hello(data) => state.serialize_field("data", data)?,
            Payload::Back(data) => state.serialize_field("data", data)?,
            Payload::Welcome(data) => state.serialize_field("data", data)?,
            Payload::Echo(data) => state.serialize_field("data", data)?,
            Payload::ChatSend(data) => state.serialize_field("data", data)?,
            Payload::ChatSent(data) => state.serialize_field("data", data)?,
            Payload::Error(data) => state.serialize_field("data", data)?,
            Payload::Invalid(data) => state.serialize_field("data", &data.data)?,
            Payload::RecapStart(data) => state.serialize_field("data", data)?,
            Payload::RecapChunk(data) => state.serialize_field("data", data)?,
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Envelope::from_value(value).map_err(D::Error::custom)
    }
}
