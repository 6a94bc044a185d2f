use std::{str::FromStr, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::{AppError, AppResult};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("parsing database url {url}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to {url}"))?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    MIGRATOR.run(pool).await.context("running migrations")?;
    Ok(())
}

pub fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ParticipantKind {
    Student,
    Tutor,
}

impl ParticipantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantKind::Student => "student",
            ParticipantKind::Tutor => "tutor",
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            ParticipantKind::Student => "students",
            ParticipantKind::Tutor => "tutors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub text: String,
    pub sent_at: i64,
    pub kind: MessageKind,
    pub is_read: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RoomRow {
    pub id: String,
    pub participant_low: String,
    pub low_kind: ParticipantKind,
    pub participant_high: String,
    pub high_kind: ParticipantKind,
    pub low_name: String,
    pub low_picture: Option<String>,
    pub high_name: String,
    pub high_picture: Option<String>,
    pub last_message_id: Option<String>,
    pub display_name: String,
    pub display_picture: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    pub id: String,
    pub kind: ParticipantKind,
    /// Last name and picture the directory reported for this member.
    pub display_name: String,
    pub display_picture: Option<String>,
}

/// A 1:1 conversation. `participants` is stored in canonical (sorted) order,
/// which carries no meaning beyond making the pair unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub participants: Vec<RoomMember>,
    pub messages: Vec<String>,
    pub last_message_id: Option<String>,
    pub display_name: String,
    pub display_picture: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Room {
    pub(crate) fn from_row(row: RoomRow, messages: Vec<String>) -> Self {
        Room {
            id: row.id,
            participants: vec![
                RoomMember {
                    id: row.participant_low,
                    kind: row.low_kind,
                    display_name: row.low_name,
                    display_picture: row.low_picture,
                },
                RoomMember {
                    id: row.participant_high,
                    kind: row.high_kind,
                    display_name: row.high_name,
                    display_picture: row.high_picture,
                },
            ],
            messages,
            last_message_id: row.last_message_id,
            display_name: row.display_name,
            display_picture: row.display_picture,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    /// Both members, failing if the stored pair is unusable.
    pub fn members(&self) -> AppResult<(&RoomMember, &RoomMember)> {
        match self.participants.as_slice() {
            [a, b] if !a.id.is_empty() && !b.id.is_empty() && a.id != b.id => Ok((a, b)),
            _ => Err(AppError::internal(format!(
                "room {} has malformed participant data",
                self.id
            ))),
        }
    }

    pub fn has_member(&self, id: &str) -> bool {
        self.participants.iter().any(|m| m.id == id)
    }

    /// The member that is not `id`. When `id` is not a member at all the
    /// first stored member is returned.
    pub fn counterpart_of(&self, id: &str) -> AppResult<&RoomMember> {
        let (a, b) = self.members()?;
        Ok(if a.id == id { b } else { a })
    }
}

/// Display identity as owned by the identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[sqlx(skip)]
    pub kind: Option<ParticipantKind>,
    #[sqlx(rename = "name")]
    pub display_name: String,
    pub profile_picture: Option<String>,
    pub email: Option<String>,
    #[serde(skip)]
    pub is_blocked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, kind: ParticipantKind) -> RoomMember {
        RoomMember { id: id.to_owned(), kind, display_name: String::new(), display_picture: None }
    }

    fn room(low: &str, high: &str) -> Room {
        Room {
            id: "r1".to_owned(),
            participants: vec![member(low, ParticipantKind::Student), member(high, ParticipantKind::Tutor)],
            messages: vec![],
            last_message_id: None,
            display_name: String::new(),
            display_picture: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn counterpart_is_the_other_member() {
        let room = room("a", "b");
        assert_eq!(room.counterpart_of("a").unwrap().id, "b");
        assert_eq!(room.counterpart_of("b").unwrap().id, "a");
        assert_eq!(room.counterpart_of("z").unwrap().id, "a");
    }

    #[test]
    fn malformed_pair_is_internal() {
        let mut broken = room("a", "");
        assert!(matches!(broken.members(), Err(AppError::Internal(_))));
        broken.participants.clear();
        assert!(matches!(broken.counterpart_of("a"), Err(AppError::Internal(_))));
    }
}
