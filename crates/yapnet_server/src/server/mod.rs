//! The event loop, its message handlers and the TCP listener feeding it.

mod core;
mod handlers;
pub mod listener;

#[cfg(test)]
pub(crate) mod testing;

pub use self::core::{Server, ServerHandle};
pub use listener::{bind, serve};
