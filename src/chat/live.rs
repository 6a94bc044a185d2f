use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{db::Message, AppError, AppResult};

use super::{messages::NewMessage, service::ChatService};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    Join { room_id: String, identity: String },
    SendMessage(NewMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Joined { room_id: String },
    ReceiveMessage { message: Message },
    MessageSent { message: Message },
    Error { message: String },
}

/// Outbound side of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        ConnectionHandle { id: Uuid::now_v7(), tx }
    }

    /// Queues an event; false once the connection's writer is gone.
    pub fn push(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Process-wide map from identity to its current live connection.
#[derive(Default)]
pub struct Hub {
    connections: DashMap<String, ConnectionHandle>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last writer wins: a newer connection replaces the previous entry.
    pub fn register(&self, identity: &str, conn: ConnectionHandle) {
        if let Some(old) = self.connections.insert(identity.to_owned(), conn) {
            tracing::debug!(%identity, superseded = %old.id, "identity reconnected");
        }
    }

    /// Drops the entry only if it still belongs to `conn_id`.
    pub fn on_disconnect(&self, identity: &str, conn_id: Uuid) -> bool {
        let removed = self
            .connections
            .remove_if(identity, |_, current| current.id == conn_id)
            .is_some();
        tracing::debug!(%identity, %conn_id, removed, "connection closed");
        removed
    }

    pub fn is_online(&self, identity: &str) -> bool {
        self.connections.contains_key(identity)
    }

    fn push(&self, identity: &str, event: ServerEvent) -> bool {
        // clone the handle out so no shard lock is held while sending
        let Some(conn) = self.connections.get(identity).map(|c| c.value().clone()) else {
            return false;
        };
        conn.push(event)
    }

    /// Validates the handshake: the room exists and `identity` is in it.
    pub async fn join(
        &self,
        chat: &ChatService,
        conn: &ConnectionHandle,
        room_id: &str,
        identity: &str,
    ) -> AppResult<()> {
        let room = chat.rooms().get_room_by_id(room_id).await?;
        if !room.has_member(identity) {
            return Err(AppError::forbidden("not a participant of this room"));
        }
        self.register(identity, conn.clone());
        tracing::info!(%identity, room_id, conn_id = %conn.id, "joined room");
        Ok(())
    }

    /// Store first, then best-effort push to the recipient. A failed store
    /// means nothing is pushed; an offline recipient is not an error.
    pub async fn on_send_message(&self, chat: &ChatService, msg: NewMessage) -> AppResult<Message> {
        let (message, recipient) = chat.send_message(msg).await?;

        let delivered = self.push(&recipient, ServerEvent::ReceiveMessage { message: message.clone() });
        tracing::debug!(
            message_id = %message.id,
            room_id = %message.room_id,
            %recipient,
            delivered,
            "message stored"
        );
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    #[test]
    fn newer_connection_supersedes_older() {
        let hub = Hub::new();
        let (first, mut first_rx) = handle();
        let (second, mut second_rx) = handle();

        hub.register("alice", first.clone());
        hub.register("alice", second.clone());

        assert!(hub.push("alice", ServerEvent::Error { message: "ping".to_owned() }));
        assert!(first_rx.try_recv().is_err());
        assert!(second_rx.try_recv().is_ok());
    }

    #[test]
    fn late_disconnect_of_stale_connection_keeps_newer_entry() {
        let hub = Hub::new();
        let (first, _first_rx) = handle();
        let (second, _second_rx) = handle();

        hub.register("alice", first.clone());
        hub.register("alice", second.clone());

        assert!(!hub.on_disconnect("alice", first.id));
        assert!(hub.is_online("alice"));

        assert!(hub.on_disconnect("alice", second.id));
        assert!(!hub.is_online("alice"));
    }

    #[test]
    fn push_to_offline_identity_is_dropped() {
        let hub = Hub::new();
        assert!(!hub.push("nobody", ServerEvent::Error { message: "x".to_owned() }));
    }

    #[test]
    fn client_events_parse_from_wire_shape() {
        let join: ClientEvent =
            serde_json::from_str(r#"{"event":"join","data":{"roomId":"r","identity":"u"}}"#).unwrap();
        assert!(matches!(join, ClientEvent::Join { room_id, identity } if room_id == "r" && identity == "u"));

        let send: ClientEvent = serde_json::from_str(
            r#"{"event":"sendMessage","data":{"roomId":"r","senderId":"u","text":"hi","sentAt":5}}"#,
        )
        .unwrap();
        let ClientEvent::SendMessage(msg) = send else { panic!("expected sendMessage") };
        assert_eq!(msg.text, "hi");
        assert_eq!(msg.kind, crate::db::MessageKind::Text);
    }
}
