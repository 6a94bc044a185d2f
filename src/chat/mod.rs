mod handlers;
mod live;
mod messages;
mod rooms;
mod service;
mod ws;

use axum::{middleware, routing::{get, patch}, Router};

use crate::{auth, AppState};

pub use live::{ClientEvent, ConnectionHandle, Hub, ServerEvent};
pub use messages::{MessageStore, NewMessage};
pub use rooms::RoomDirectory;
pub use service::{ChatService, ChatSummary, Conversation};
pub use ws::{close, dispatch, ConnState};

/// Student-facing chat routes, behind the student gate.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/contacts/{user_id}", get(handlers::contacts))
        .route("/chats/{user_id}", get(handlers::chats))
        .route("/room/{receiver_id}/{sender_id}", get(handlers::room))
        .route("/room-message/{room_id}/{user_id}", get(handlers::room_message))
        .route("/room-message/{room_id}/{user_id}/read", patch(handlers::mark_read))
        .route("/room-message/{room_id}/{user_id}/unread", get(handlers::unread))
        .route_layer(middleware::from_fn_with_state(state, auth::student_gate))
}

/// Tutor-facing chat routes, behind the tutor gate.
pub fn tutor_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/chats/{tutor_id}", get(handlers::tutor_chats))
        .route("/room/{receiver_id}/{sender_id}", get(handlers::room))
        .route("/room-message/{room_id}/{tutor_id}", get(handlers::room_message))
        .route("/room-message/{room_id}/{tutor_id}/read", patch(handlers::mark_read))
        .route("/room-message/{room_id}/{tutor_id}/unread", get(handlers::unread))
        .route_layer(middleware::from_fn_with_state(state, auth::tutor_gate))
}

pub fn ws_router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::chat_ws))
}
