//! TCP accept loop and WebSocket upgrade.

use crate::{
    config::ServerConfig,
    connection::start_session,
    error::ServerError,
    server::ServerHandle,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async_with_config, tungstenite::protocol::WebSocketConfig};
use tracing::{error, info, warn};

/// Binds a listening socket with `SO_REUSEADDR` set.
pub fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| ServerError::Network(format!("Setting SO_REUSEADDR failed: {e}")))?;

    socket
        .bind(&addr.into())
        .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
    socket
        .listen(1024)
        .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;

    let std_listener: StdTcpListener = socket.into();
    std_listener
        .set_nonblocking(true)
        .map_err(|e| ServerError::Network(format!("Setting non-blocking mode failed: {e}")))?;

    TcpListener::from_std(std_listener)
        .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
}

fn websocket_config(max_frame_size: usize) -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(max_frame_size))
        .max_frame_size(Some(max_frame_size))
}

/// Accepts connections until the listener fails.
///
/// Each accepted socket is upgraded on its own task; a failed upgrade only
/// affects that socket. Upgraded streams are handed to [`start_session`].
///
/// # Arguments
///
/// * `listener` - A bound listener, usually from [`bind`]
/// * `server` - Handle to a running event loop
/// * `config` - Source of the size and keepalive limits
pub async fn serve(
    listener: TcpListener,
    server: ServerHandle,
    config: &ServerConfig,
) -> Result<(), ServerError> {
    let limits = config.session_limits();
    if let Ok(addr) = listener.local_addr() {
        info!("✅ Listening for WebSocket connections on {}", addr);
    }

    loop {
        let (stream, addr) = listener
            .accept()
            .await
            .map_err(|e| ServerError::Network(format!("Failed to accept connection: {e}")))?;

        let server = server.clone();
        tokio::spawn(async move {
            let ws_stream =
                match accept_async_with_config(stream, Some(websocket_config(limits.max_frame_size))).await {
                    Ok(ws) => ws,
                    Err(e) => {
                        warn!("WebSocket handshake failed for {}: {}", addr, e);
                        return;
                    }
                };

            if let Err(e) = start_session(ws_stream, Some(addr), server, limits).await {
                error!("Failed to start session for {}: {}", addr, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_conflict_is_a_network_error() {
        let first = bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let taken = first.local_addr().unwrap();
        // SO_REUSEADDR does not allow two live listeners on one port.
        assert!(matches!(bind(taken), Err(ServerError::Network(_))));
    }
}
