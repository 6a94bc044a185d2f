use axum::{
    debug_handler,
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::Value;

use crate::{appresult::reply, auth::Caller, directory::SearchFilter, AppResult, AppState};

use super::service::{parse_id, ChatService};

#[debug_handler(state = AppState)]
pub(crate) async fn contacts(
    State(chat): State<ChatService>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
    Query(filter): Query<SearchFilter>,
) -> AppResult<Json<Value>> {
    caller.ensure_is(&user_id)?;
    let contacts = chat.get_contacts(&filter, Some(&user_id)).await?;
    reply("Contacts fetched", "contacts", contacts)
}

#[debug_handler(state = AppState)]
pub(crate) async fn chats(
    State(chat): State<ChatService>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
    Query(filter): Query<SearchFilter>,
) -> AppResult<Json<Value>> {
    caller.ensure_is(&user_id)?;
    let chats = chat.get_chats(&filter, &user_id).await?;
    reply("Chats fetched", "chats", chats)
}

#[debug_handler(state = AppState)]
pub(crate) async fn tutor_chats(
    State(chat): State<ChatService>,
    Extension(caller): Extension<Caller>,
    Path(tutor_id): Path<String>,
    Query(filter): Query<SearchFilter>,
) -> AppResult<Json<Value>> {
    parse_id(caller.id_field(), &tutor_id)?;
    caller.ensure_is(&tutor_id)?;
    let chats = chat.get_tutor_chats(&filter, &tutor_id).await?;
    reply("Chats fetched", "chats", chats)
}

#[debug_handler(state = AppState)]
pub(crate) async fn room(
    State(chat): State<ChatService>,
    Extension(caller): Extension<Caller>,
    Path((receiver_id, sender_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    parse_id("senderId", &sender_id)?;
    caller.ensure_is(&sender_id)?;
    let room = chat.get_room(&receiver_id, &sender_id).await?;
    reply("Room fetched", "room", room)
}

#[debug_handler(state = AppState)]
pub(crate) async fn room_message(
    State(chat): State<ChatService>,
    Extension(caller): Extension<Caller>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    parse_id(caller.id_field(), &user_id)?;
    caller.ensure_is(&user_id)?;
    let conversation = chat.get_room_message(&room_id, &user_id).await?;
    reply("Room messages fetched", "conversation", conversation)
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark_read(
    State(chat): State<ChatService>,
    Extension(caller): Extension<Caller>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    parse_id(caller.id_field(), &user_id)?;
    caller.ensure_is(&user_id)?;
    let updated = chat.mark_read(&room_id, &user_id).await?;
    reply("Messages marked as read", "updated", updated)
}

#[debug_handler(state = AppState)]
pub(crate) async fn unread(
    State(chat): State<ChatService>,
    Extension(caller): Extension<Caller>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    parse_id(caller.id_field(), &user_id)?;
    caller.ensure_is(&user_id)?;
    let count = chat.unread_count(&room_id, &user_id).await?;
    reply("Unread count fetched", "unreadCount", count)
}
