#![allow(dead_code)]

use std::sync::Arc;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tutorchat::{
    auth::TokenKeys,
    chat::{ChatService, NewMessage},
    db::{self, MessageKind, ParticipantKind},
    directory::SqliteDirectory,
    AppState,
};
use uuid::Uuid;

/// One connection, so every query sees the same in-memory database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::migrate(&pool).await.unwrap();
    pool
}

/// A real file database with a connection pool, for tests that need
/// writers on separate connections.
pub async fn file_pool(connections: u32) -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("chat.db").display());
    let pool = db::connect(&url, connections).await.unwrap();
    db::migrate(&pool).await.unwrap();
    (dir, pool)
}

pub async fn seed(pool: &SqlitePool, kind: ParticipantKind, name: &str, blocked: bool) -> String {
    let id = Uuid::now_v7().to_string();
    let table = match kind {
        ParticipantKind::Student => "students",
        ParticipantKind::Tutor => "tutors",
    };
    sqlx::query(&format!(
        "INSERT INTO {table} (id,name,email,profile_picture,is_blocked,created_at) VALUES (?,?,?,?,?,?)"
    ))
    .bind(&id)
    .bind(name)
    .bind(format!("{}@example.com", name.to_lowercase().replace(' ', ".")))
    .bind(format!("https://cdn.example.com/{id}.png"))
    .bind(blocked)
    .bind(db::now_millis())
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn student(pool: &SqlitePool, name: &str) -> String {
    seed(pool, ParticipantKind::Student, name, false).await
}

pub async fn tutor(pool: &SqlitePool, name: &str) -> String {
    seed(pool, ParticipantKind::Tutor, name, false).await
}

pub fn service(pool: &SqlitePool) -> ChatService {
    ChatService::new(pool.clone(), Arc::new(SqliteDirectory::new(pool.clone())))
}

pub fn keys() -> TokenKeys {
    TokenKeys::new(
        "test-access-secret",
        "test-refresh-secret",
        time::Duration::minutes(15),
        time::Duration::days(7),
    )
}

pub fn state(pool: &SqlitePool) -> AppState {
    AppState::new(pool.clone(), keys())
}

pub fn text(room_id: &str, sender_id: &str, text: &str, sent_at: i64) -> NewMessage {
    NewMessage {
        room_id: room_id.to_owned(),
        sender_id: sender_id.to_owned(),
        text: text.to_owned(),
        sent_at,
        kind: MessageKind::Text,
    }
}
