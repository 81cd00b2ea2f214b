//! # yapnet server - realtime chat session engine
//!
//! Clients connect over WebSocket, introduce themselves (or come back with a
//! token), and post into named chats gated by player and group access lists.
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **World** ([`world`]) - players, chats and the chat-access predicate.
//!   Plain data, no locks.
//! * **Connection sessions** ([`connection`]) - one inbound and one outbound
//!   task per connection, with keepalive, a size limit and a bounded mailbox.
//! * **Event loop** ([`Server`]) - the only owner of the world and of the
//!   connection registry. Processes one event at a time.
//! * **Listener** ([`bind`], [`serve`]) - TCP accept loop and WebSocket upgrade.
//!
//! ### Message Flow
//!
//! 1. A session reads a frame and decodes it into an [`Envelope`](yapnet_protocol::Envelope)
//! 2. The envelope is queued on the event loop's shared inbound queue
//! 3. The loop dispatches it by message type; handlers read and mutate the world
//! 4. Replies and broadcasts go onto the target connections' mailboxes
//! 5. Each session's outbound task stamps a sequence number and writes the frame
//!
//! ## Error Handling
//!
//! * [`ClientError`] - refused requests, answered with an Error envelope
//! * [`WorldError`](world::WorldError) - lookup and uniqueness failures in the world
//! * [`ServerError`] - network, configuration and lifecycle faults
//!
//! ## Example
//!
//! ```no_run
//! use yapnet_server::{bind, serve, Server, ServerConfig};
//!
//! # async fn run() -> Result<(), yapnet_server::ServerError> {
//! let config = ServerConfig::default();
//! let (server, handle) = Server::new(config.clone())?;
//! tokio::spawn(server.run());
//!
//! let listener = bind(config.bind_address)?;
//! serve(listener, handle, &config).await
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod server;
pub mod world;

pub use config::{ChatConfig, ServerConfig, SessionLimits};
pub use connection::{start_session, ConnectionId, DisconnectReason};
pub use error::{ClientError, ServerError};
pub use logging::setup_logging;
pub use server::{bind, serve, Server, ServerHandle};
pub use world::{AccessEntry, ChatId, GroupId, PlayerId, World, WorldError};
