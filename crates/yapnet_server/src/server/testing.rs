//! Helpers for driving the event loop one step at a time in tests.

use super::{Server, ServerHandle};
use crate::connection::{ConnectionHandle, ConnectionId};
use tokio::sync::mpsc;
use yapnet_protocol::{Envelope, Hello, MessageData, MsgType};

pub(crate) async fn connect(
    server: &mut Server,
    handle: &ServerHandle,
) -> (ConnectionId, mpsc::Receiver<Envelope>) {
    let id = ConnectionId::next();
    let (mailbox, rx) = mpsc::channel(32);
    handle
        .connect(ConnectionHandle {
            id,
            remote_addr: None,
            mailbox,
        })
        .await
        .unwrap();
    assert!(server.step().await);
    (id, rx)
}

pub(crate) async fn send<D: MessageData>(
    server: &mut Server,
    handle: &ServerHandle,
    id: ConnectionId,
    data: D,
) {
    handle.receive(id, Envelope::msg(data)).await.unwrap();
    assert!(server.step().await);
}

/// Connects and says Hello, consuming the Welcome.
pub(crate) async fn login(
    server: &mut Server,
    handle: &ServerHandle,
    name: &str,
) -> (ConnectionId, mpsc::Receiver<Envelope>) {
    let (id, mut rx) = connect(server, handle).await;
    send(
        server,
        handle,
        id,
        Hello {
            name: name.to_string(),
            versions: vec!["1".to_string()],
        },
    )
    .await;
    let welcome = rx.try_recv().unwrap();
    assert_eq!(welcome.msg_type(), MsgType::Welcome);
    (id, rx)
}
