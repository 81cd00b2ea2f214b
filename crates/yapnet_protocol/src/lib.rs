//! # Yapnet Protocol
//!
//! Wire-level definitions shared by the yapnet server and its clients.
//!
//! Every frame on the wire is an [`Envelope`]: a message-type tag, a sequence
//! number and a payload whose shape is determined by the tag.
//!
//! ```json
//! { "msg_type": "chas", "seq": 4, "data": { "chat_target": "general", "chat_content": "hi" } }
//! ```
//!
//! ## Decoding
//!
//! Decoding happens in two phases. The tag and sequence number are pulled out
//! of the frame first, then the payload is decoded into the type registered for
//! that tag. Tags nobody registered never fail the frame: they land in
//! [`Invalid`] with the raw payload preserved, so the server can answer with a
//! typed error instead of dropping the client.
//!
//! ## Building messages
//!
//! ```rust
//! use yapnet_protocol::{ChatSend, Envelope, MsgType};
//!
//! let envelope = Envelope::msg(ChatSend {
//!     chat_content: "hello".to_string(),
//!     chat_target: "general".to_string(),
//! });
//! assert_eq!(envelope.msg_type(), MsgType::ChatSend);
//! ```

pub mod body;
pub mod envelope;
pub mod error;
pub mod msg_type;
pub mod seq;

pub use body::{
    Back, ChatSend, ChatSent, Echo, ErrorMessage, Hello, Invalid, RecapChunk, RecapStart, Welcome,
    PROTOCOL_VERSION, RECAP_CHUNK_SIZE,
};
pub use envelope::{Envelope, MessageData, Payload};
pub use error::ProtocolError;
pub use msg_type::MsgType;
pub use seq::{Seq, SeqProvider};
