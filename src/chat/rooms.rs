use anyhow::Context;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::{now_millis, Participant, ParticipantKind, Room, RoomMember, RoomRow},
    AppError, AppResult,
};

const ROOM_COLUMNS: &str = "id,participant_low,low_kind,participant_high,high_kind,\
    low_name,low_picture,high_name,high_picture,\
    last_message_id,display_name,display_picture,created_at,updated_at";

/// Canonical order for an unordered pair.
pub(crate) fn ordered<'a, T>(a: (&'a str, T), b: (&'a str, T)) -> ((&'a str, T), (&'a str, T)) {
    if a.0 <= b.0 { (a, b) } else { (b, a) }
}

/// Maps an unordered pair of participants to exactly one room.
#[derive(Clone)]
pub struct RoomDirectory {
    db_pool: SqlitePool,
}

impl RoomDirectory {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    async fn message_ids(&self, room_id: &str) -> AppResult<Vec<String>> {
        let ids: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM messages WHERE room_id=? ORDER BY sent_at,seq")
                .bind(room_id)
                .fetch_all(&self.db_pool)
                .await
                .with_context(|| format!("loading message ids of room {room_id}"))?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn hydrate(&self, row: RoomRow) -> AppResult<Room> {
        let messages = self.message_ids(&row.id).await?;
        Ok(Room::from_row(row, messages))
    }

    /// Lookup only; argument order does not matter.
    pub async fn get_room(&self, a: &str, b: &str) -> AppResult<Option<Room>> {
        let ((low, _), (high, _)) = ordered((a, ()), (b, ()));
        let row: Option<RoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE participant_low=? AND participant_high=?"
        ))
        .bind(low)
        .bind(high)
        .fetch_optional(&self.db_pool)
        .await
        .with_context(|| format!("looking up room for {low}/{high}"))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Inserts a room for the pair unless one exists. Losing an insert race
    /// returns the room the winner created.
    pub async fn create_room(&self, creator: &Participant, counterpart: &Participant) -> AppResult<Room> {
        if creator.id == counterpart.id {
            return Err(AppError::bad_request("cannot open a room with yourself"));
        }
        let creator_kind = creator.kind.ok_or_else(|| AppError::internal("creator kind unknown"))?;
        let counterpart_kind = counterpart
            .kind
            .ok_or_else(|| AppError::internal("counterpart kind unknown"))?;

        let ((low, (low_kind, low_label)), (high, (high_kind, high_label))) = ordered(
            (creator.id.as_str(), (creator_kind, creator)),
            (counterpart.id.as_str(), (counterpart_kind, counterpart)),
        );
        let id = Uuid::now_v7().to_string();
        let now = now_millis();

        let inserted = sqlx::query(&format!(
            "INSERT INTO rooms ({ROOM_COLUMNS}) VALUES (?,?,?,?,?,?,?,?,?,NULL,?,?,?,?)"
        ))
        .bind(&id)
        .bind(low)
        .bind(low_kind)
        .bind(high)
        .bind(high_kind)
        .bind(&low_label.display_name)
        .bind(&low_label.profile_picture)
        .bind(&high_label.display_name)
        .bind(&high_label.profile_picture)
        .bind(&counterpart.display_name)
        .bind(&counterpart.profile_picture)
        .bind(now)
        .bind(now)
        .execute(&self.db_pool)
        .await;

        match inserted {
            Ok(_) => {
                tracing::debug!(room_id = %id, %low, %high, "created room");
            }
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                tracing::debug!(%low, %high, "room already created concurrently, re-fetching");
            }
            Err(err) => {
                return Err(anyhow::Error::from(err)
                    .context(format!("creating room for {low}/{high}"))
                    .into());
            }
        }

        self.get_room(low, high)
            .await?
            .ok_or_else(|| AppError::internal(format!("room for {low}/{high} vanished after insert")))
    }

    /// Looks up, then creates on a miss. The two steps are not atomic;
    /// `create_room` absorbs the race.
    pub async fn get_or_create(&self, creator: &Participant, counterpart: &Participant) -> AppResult<Room> {
        if let Some(room) = self.get_room(&creator.id, &counterpart.id).await? {
            return Ok(room);
        }
        self.create_room(creator, counterpart).await
    }

    pub async fn get_room_by_id(&self, id: &str) -> AppResult<Room> {
        let row: Option<RoomRow> = sqlx::query_as(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id=?"))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .with_context(|| format!("loading room {id}"))?;

        let Some(row) = row else {
            return Err(AppError::not_found("Room not found"));
        };
        self.hydrate(row).await
    }

    /// Stores `fresh` as the cached label of `member` when it has gone stale.
    pub async fn refresh_label(&self, room: &Room, member: &RoomMember, fresh: &Participant) -> AppResult<()> {
        if member.display_name == fresh.display_name && member.display_picture == fresh.profile_picture {
            return Ok(());
        }
        let sql = if room.participants.first().is_some_and(|low| low.id == member.id) {
            "UPDATE rooms SET low_name=?, low_picture=? WHERE id=? AND participant_low=?"
        } else {
            "UPDATE rooms SET high_name=?, high_picture=? WHERE id=? AND participant_high=?"
        };
        sqlx::query(sql)
            .bind(&fresh.display_name)
            .bind(&fresh.profile_picture)
            .bind(&room.id)
            .bind(&member.id)
            .execute(&self.db_pool)
            .await
            .with_context(|| format!("refreshing label of {} in room {}", member.id, room.id))?;
        tracing::debug!(room_id = %room.id, member = %member.id, "refreshed cached label");
        Ok(())
    }

    /// Rooms where `participant_id` sits on a side recorded with `kind`,
    /// most recently active first.
    pub async fn rooms_for(&self, participant_id: &str, kind: ParticipantKind) -> AppResult<Vec<Room>> {
        let rows: Vec<RoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms \
             WHERE (participant_low=? AND low_kind=?) OR (participant_high=? AND high_kind=?) \
             ORDER BY updated_at DESC"
        ))
        .bind(participant_id)
        .bind(kind)
        .bind(participant_id)
        .bind(kind)
        .fetch_all(&self.db_pool)
        .await
        .with_context(|| format!("listing rooms of {} {participant_id}", kind.as_str()))?;

        let mut rooms = Vec::with_capacity(rows.len());
        for row in rows {
            rooms.push(self.hydrate(row).await?);
        }
        Ok(rooms)
    }
}
