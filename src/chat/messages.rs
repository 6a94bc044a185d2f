use anyhow::Context;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::{now_millis, Message, MessageKind},
    AppError, AppResult,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub room_id: String,
    pub sender_id: String,
    pub text: String,
    pub sent_at: i64,
    #[serde(default)]
    pub kind: MessageKind,
}

/// Append-only message log, one ordered stream per room.
#[derive(Clone)]
pub struct MessageStore {
    db_pool: SqlitePool,
}

impl MessageStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Inserts the message and moves the room's last-message pointer in one
    /// transaction.
    pub async fn append(&self, msg: NewMessage) -> AppResult<Message> {
        if msg.text.trim().is_empty() {
            return Err(AppError::bad_request("message text must not be empty"));
        }

        let message = Message {
            id: Uuid::now_v7().to_string(),
            room_id: msg.room_id,
            sender_id: msg.sender_id,
            text: msg.text,
            sent_at: msg.sent_at,
            kind: msg.kind,
            is_read: false,
        };

        let mut tx = self.db_pool.begin().await.context("starting append")?;

        // write first so the transaction holds the write lock from its first statement
        let moved = sqlx::query("UPDATE rooms SET last_message_id=?, updated_at=? WHERE id=?")
            .bind(&message.id)
            .bind(now_millis())
            .bind(&message.room_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("moving last message of room {}", message.room_id))?;
        if moved.rows_affected() == 0 {
            return Err(AppError::bad_request(format!("unknown room {}", message.room_id)));
        }

        sqlx::query("INSERT INTO messages (id,room_id,sender_id,text,sent_at,kind,is_read) VALUES (?,?,?,?,?,?,0)")
            .bind(&message.id)
            .bind(&message.room_id)
            .bind(&message.sender_id)
            .bind(&message.text)
            .bind(message.sent_at)
            .bind(message.kind)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting message into room {}", message.room_id))?;

        tx.commit().await.context("committing append")?;

        Ok(message)
    }

    /// Full transcript, oldest first; equal timestamps keep insertion order.
    pub async fn list_by_room(&self, room_id: &str) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id,room_id,sender_id,text,sent_at,kind,is_read FROM messages WHERE room_id=? ORDER BY sent_at,seq",
        )
        .bind(room_id)
        .fetch_all(&self.db_pool)
        .await
        .with_context(|| format!("listing messages of room {room_id}"))?;
        Ok(messages)
    }

    pub async fn find(&self, id: &str) -> AppResult<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT id,room_id,sender_id,text,sent_at,kind,is_read FROM messages WHERE id=?",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await
        .with_context(|| format!("loading message {id}"))?;
        Ok(message)
    }

    /// Unread messages in the room written by anyone but `participant_id`.
    pub async fn count_unread(&self, room_id: &str, participant_id: &str) -> AppResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE room_id=? AND sender_id<>? AND is_read=0")
                .bind(room_id)
                .bind(participant_id)
                .fetch_one(&self.db_pool)
                .await
                .with_context(|| format!("counting unread in room {room_id}"))?;
        Ok(count)
    }

    /// Marks everything `reader_id` received in the room as read.
    pub async fn mark_read(&self, room_id: &str, reader_id: &str) -> AppResult<u64> {
        let result = sqlx::query("UPDATE messages SET is_read=1 WHERE room_id=? AND sender_id<>? AND is_read=0")
            .bind(room_id)
            .bind(reader_id)
            .execute(&self.db_pool)
            .await
            .with_context(|| format!("marking room {room_id} read"))?;
        Ok(result.rows_affected())
    }
}
