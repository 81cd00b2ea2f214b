//! Per-connection I/O.
//!
//! Every connection runs two tasks:
//!
//! * the **inbound loop** reads one frame at a time, decodes it and forwards
//!   the envelope to the event loop. A read deadline of `pong_timeout` is
//!   re-armed by every frame, pongs included.
//! * the **outbound loop** drains the connection's mailbox in FIFO order,
//!   stamps each envelope with the next sequence number, and sends keepalive
//!   pings on a fixed period.
//!
//! Either loop ending on a transport fault reports the connection lost. The
//! event loop then drops the registry entry, which closes the mailbox; the
//! outbound loop answers that with one last close frame and releases the
//! transport.

use super::{ConnectionHandle, ConnectionId, DisconnectReason};
use crate::config::SessionLimits;
use crate::error::ServerError;
use crate::server::ServerHandle;
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};
use yapnet_protocol::{Envelope, SeqProvider};

/// Registers a freshly upgraded transport with the event loop and spawns its
/// two I/O loops.
///
/// # Arguments
///
/// * `transport` - An upgraded WebSocket (or anything framed the same way)
/// * `remote_addr` - Peer address, used for logging only
/// * `server` - Handle to the event loop
/// * `limits` - Keepalive, size and queue limits for this connection
///
/// # Returns
///
/// The identifier assigned to the connection, or [`ServerError::Stopped`] if
/// the event loop is gone.
pub async fn start_session<S>(
    transport: S,
    remote_addr: Option<SocketAddr>,
    server: ServerHandle,
    limits: SessionLimits,
) -> Result<ConnectionId, ServerError>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + Unpin + 'static,
{
    let id = ConnectionId::next();
    let (mailbox_tx, mailbox_rx) = mpsc::channel(limits.mailbox_capacity.max(1));

    server
        .connect(ConnectionHandle {
            id,
            remote_addr,
            mailbox: mailbox_tx,
        })
        .await?;

    match remote_addr {
        Some(addr) => info!("🔗 Connection {} established from {}", id, addr),
        None => info!("🔗 Connection {} established", id),
    }

    let (sink, stream): (SplitSink<S, Message>, SplitStream<S>) = transport.split();
    tokio::spawn(outbound_loop(id, sink, mailbox_rx, server.clone(), limits));
    tokio::spawn(inbound_loop(id, stream, server, limits));

    Ok(id)
}

async fn inbound_loop<S>(
    id: ConnectionId,
    mut stream: SplitStream<S>,
    server: ServerHandle,
    limits: SessionLimits,
) where
    S: Stream<Item = Result<Message, WsError>> + Send + Unpin,
{
    let reason = loop {
        let next = match timeout(limits.pong_timeout, stream.next()).await {
            Ok(next) => next,
            Err(_) => break DisconnectReason::Timeout,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => break DisconnectReason::Transport(e.to_string()),
            None => break DisconnectReason::Closed,
        };

        let raw: &[u8] = match &message {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(bytes) => &bytes[..],
            Message::Close(_) => break DisconnectReason::Closed,
            // Liveness only; the deadline above is already re-armed.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };

        if raw.len() > limits.max_frame_size {
            break DisconnectReason::FrameTooLarge(raw.len());
        }

        match Envelope::decode(raw) {
            Ok(envelope) => {
                debug!(
                    "📨 {} -> {} (seq {})",
                    id,
                    envelope.msg_type(),
                    envelope.seq
                );
                if server.receive(id, envelope).await.is_err() {
                    break DisconnectReason::ServerStopped;
                }
            }
            Err(e) => warn!("⚠️ Dropping malformed message from {}: {}", id, e),
        }
    };

    match &reason {
        DisconnectReason::Closed | DisconnectReason::Timeout => info!("🔌 Connection {} ended: {}", id, reason),
        _ => error!("❌ Connection {} failed: {}", id, reason),
    }
    // A stopped event loop has nothing left to clean up.
    let _ = server.disconnect(id, reason).await;
}

async fn outbound_loop<S>(
    id: ConnectionId,
    mut sink: SplitSink<S, Message>,
    mut mailbox: mpsc::Receiver<Envelope>,
    server: ServerHandle,
    limits: SessionLimits,
) where
    S: Sink<Message, Error = WsError> + Send + Unpin,
{
    let mut seq = SeqProvider::new();
    let mut ping = interval_at(Instant::now() + limits.ping_period, limits.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let failure = loop {
        tokio::select! {
            next = mailbox.recv() => {
                let Some(envelope) = next else {
                    // Closed by the event loop after disconnect processing.
                    let _ = timeout(limits.write_timeout, sink.send(Message::Close(None))).await;
                    break None;
                };

                let envelope = envelope.with_seq(seq.take());
                let text = match envelope.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode {} for {}: {}", envelope.msg_type(), id, e);
                        continue;
                    }
                };
                debug!("📤 {} <- {} (seq {})", id, envelope.msg_type(), envelope.seq);

                if let Err(reason) = write(&mut sink, Message::text(text), limits.write_timeout).await {
                    break Some(reason);
                }
            }
            _ = ping.tick() => {
                if let Err(reason) = write(&mut sink, Message::Ping(Default::default()), limits.write_timeout).await {
                    break Some(reason);
                }
            }
        }
    };

    // Release the mailbox before reporting so the event loop never waits on it.
    drop(mailbox);
    let _ = sink.close().await;

    if let Some(reason) = failure {
        error!("❌ Connection {} write side failed: {}", id, reason);
        let _ = server.disconnect(id, reason).await;
    }
}

async fn write<S>(
    sink: &mut SplitSink<S, Message>,
    message: Message,
    deadline: Duration,
) -> Result<(), DisconnectReason>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    match timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(DisconnectReason::WriteFailed(e.to_string())),
        Err(_) => Err(DisconnectReason::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::server::Server;
    use serde_json::json;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;
    use tokio_tungstenite::WebSocketStream;
    use yapnet_protocol::{Echo, MsgType, Payload};

    type Client = WebSocketStream<DuplexStream>;

    async fn connect(limits: SessionLimits) -> Client {
        let (server, handle) = Server::new(ServerConfig::default()).unwrap();
        tokio::spawn(server.run());

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client_ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;

        start_session(server_ws, None, handle, limits).await.unwrap();
        client_ws
    }

    /// Next envelope, skipping keepalive traffic.
    async fn recv(client: &mut Client) -> Envelope {
        loop {
            let message = timeout(Duration::from_secs(2), client.next())
                .await
                .expect("timed out waiting for a message")
                .expect("stream ended")
                .expect("transport error");
            match message {
                Message::Text(text) => return Envelope::decode(text.as_bytes()).unwrap(),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    /// Reads until the server closes the connection.
    async fn expect_closed(client: &mut Client) {
        let closed = timeout(Duration::from_secs(2), async {
            loop {
                match client.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "server did not close the connection");
    }

    fn echo_payload() -> Echo {
        let value = json!({"a": [1, 2], "b": "x"});
        Echo(value.as_object().unwrap().clone())
    }

    #[tokio::test]
    async fn test_echo_round_trip_with_sequence_numbers() {
        let mut client = connect(SessionLimits::default()).await;

        for expected_seq in 0..2 {
            let text = Envelope::msg(echo_payload()).with_seq(41).encode().unwrap();
            client.send(Message::text(text)).await.unwrap();

            let reply = recv(&mut client).await;
            assert_eq!(reply.seq, expected_seq);
            assert_eq!(reply.payload, Payload::Echo(echo_payload()));
        }
    }

    #[tokio::test]
    async fn test_binary_frames_are_accepted() {
        let mut client = connect(SessionLimits::default()).await;

        let text = Envelope::msg(echo_payload()).encode().unwrap();
        client.send(Message::binary(text.into_bytes())).await.unwrap();

        assert_eq!(recv(&mut client).await.msg_type(), MsgType::Echo);
    }

    #[tokio::test]
    async fn test_malformed_message_keeps_connection() {
        let mut client = connect(SessionLimits::default()).await;

        client.send(Message::text("not json")).await.unwrap();
        client
            .send(Message::text(r#"{"msg_type":"helo","seq":0}"#))
            .await
            .unwrap();

        let text = Envelope::msg(echo_payload()).encode().unwrap();
        client.send(Message::text(text)).await.unwrap();

        // Neither bad frame produced a reply; the echo is the first envelope.
        let reply = recv(&mut client).await;
        assert_eq!(reply.msg_type(), MsgType::Echo);
        assert_eq!(reply.seq, 0);
    }

    #[tokio::test]
    async fn test_oversize_frame_disconnects() {
        let limits = SessionLimits {
            max_frame_size: 32,
            ..Default::default()
        };
        let mut client = connect(limits).await;

        client.send(Message::text("x".repeat(100))).await.unwrap();
        expect_closed(&mut client).await;
    }

    #[tokio::test]
    async fn test_pings_are_sent() {
        let limits = SessionLimits {
            ping_period: Duration::from_millis(20),
            pong_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let mut client = connect(limits).await;

        let first = timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(matches!(first, Message::Ping(_)), "got {first:?}");
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let limits = SessionLimits {
            ping_period: Duration::from_millis(40),
            pong_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let mut client = connect(limits).await;

        // Not reading means no pongs go back.
        tokio::time::sleep(Duration::from_millis(300)).await;
        expect_closed(&mut client).await;
    }

    #[tokio::test]
    async fn test_pongs_keep_connection_alive() {
        let limits = SessionLimits {
            ping_period: Duration::from_millis(40),
            pong_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let mut client = connect(limits).await;

        // Reading answers each ping; stay well past several read deadlines.
        let until = Instant::now() + Duration::from_millis(500);
        let mut pings = 0;
        loop {
            match tokio::time::timeout_at(until, client.next()).await {
                Err(_) => break,
                Ok(Some(Ok(Message::Ping(_)))) => pings += 1,
                Ok(other) => panic!("connection ended early: {other:?}"),
            }
        }
        assert!(pings >= 3, "only {pings} ping(s) seen");

        let text = Envelope::msg(echo_payload()).encode().unwrap();
        client.send(Message::text(text)).await.unwrap();
        assert_eq!(recv(&mut client).await.msg_type(), MsgType::Echo);
    }

    #[tokio::test]
    async fn test_closed_mailbox_sends_close_frame() {
        let (server, handle) = Server::new(ServerConfig::default()).unwrap();
        let event_loop = tokio::spawn(server.run());

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let mut client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        start_session(server_ws, None, handle, SessionLimits::default())
            .await
            .unwrap();

        // Stopping the loop drops the registry and every mailbox with it.
        event_loop.abort();

        let frame = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("no frame after the mailbox closed")
            .expect("stream ended without a close frame")
            .unwrap();
        assert!(matches!(frame, Message::Close(_)), "got {frame:?}");
    }
}
