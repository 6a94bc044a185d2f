use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{ws::{Message as Frame, WebSocket}, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::AppState;

use super::{
    live::{ClientEvent, ConnectionHandle, Hub, ServerEvent},
    service::ChatService,
};

/// Where one live connection is in its join handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnState {
    #[default]
    Connecting,
    Joined { room_id: String, identity: String },
}

impl ConnState {
    pub fn identity(&self) -> Option<&str> {
        match self {
            ConnState::Connecting => None,
            ConnState::Joined { identity, .. } => Some(identity),
        }
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    State(chat): State<ChatService>,
    State(hub): State<Arc<Hub>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve(socket, chat, hub))
}

async fn serve(socket: WebSocket, chat: ChatService, hub: Arc<Hub>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = ConnectionHandle::new(tx);
    tracing::debug!(conn_id = %conn.id, "socket connected");

    let mut writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Frame::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut state = ConnState::Connecting;

    loop {
        let frame = tokio::select! {
            frame = receiver.next() => frame,
            _ = &mut writer => break,
        };
        let text = match frame {
            Some(Ok(Frame::Text(text))) => text,
            Some(Ok(Frame::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => continue,
        };

        match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => dispatch(&chat, &hub, &conn, &mut state, event).await,
            Err(err) => {
                conn.push(ServerEvent::Error { message: format!("unreadable event: {err}") });
            }
        }
    }

    close(&hub, &conn, &state);
    writer.abort();
}

/// Applies one client event to a connection. Every reply goes back through
/// `conn`; only a stored message reaches anyone else.
pub async fn dispatch(
    chat: &ChatService,
    hub: &Hub,
    conn: &ConnectionHandle,
    state: &mut ConnState,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Join { room_id, identity } => {
            if let Err(err) = hub.join(chat, conn, &room_id, &identity).await {
                conn.push(ServerEvent::Error { message: err.public_message() });
                return;
            }
            if let Some(previous) = state.identity() {
                if previous != identity {
                    hub.on_disconnect(previous, conn.id);
                }
            }
            conn.push(ServerEvent::Joined { room_id: room_id.clone() });
            *state = ConnState::Joined { room_id, identity };
        }
        ClientEvent::SendMessage(msg) => {
            let Some(identity) = state.identity() else {
                conn.push(ServerEvent::Error { message: "join a room first".to_owned() });
                return;
            };
            if msg.sender_id != identity {
                conn.push(ServerEvent::Error { message: "senderId does not match the joined identity".to_owned() });
                return;
            }
            match hub.on_send_message(chat, msg).await {
                Ok(message) => {
                    conn.push(ServerEvent::MessageSent { message });
                }
                Err(err) => {
                    tracing::warn!(conn_id = %conn.id, %err, "send failed");
                    conn.push(ServerEvent::Error { message: err.public_message() });
                }
            }
        }
    }
}

/// Releases the registry entry, unless a newer connection already owns it.
pub fn close(hub: &Hub, conn: &ConnectionHandle, state: &ConnState) {
    if let ConnState::Joined { room_id, identity } = state {
        hub.on_disconnect(identity, conn.id);
        tracing::info!(%identity, %room_id, conn_id = %conn.id, "left room");
    }
}
