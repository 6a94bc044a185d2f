use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::{Message, Participant, ParticipantKind, Room, RoomMember},
    directory::{IdentityDirectory, SearchFilter},
    AppError, AppResult,
};

use super::{messages::{MessageStore, NewMessage}, rooms::RoomDirectory};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub room_id: String,
    pub counterpart_id: String,
    pub counterpart_display_name: String,
    pub counterpart_picture: Option<String>,
    pub last_message_text: Option<String>,
    pub last_message_at: Option<i64>,
    pub unread_count: i64,
}

/// A room transcript as seen by one of its participants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participants: [Participant; 2],
    pub messages: Vec<Message>,
    pub last_message: Option<Message>,
    pub name: String,
    pub profile_picture: Option<String>,
}

/// Ids are stored in hyphenated lowercase form, so that is the only form
/// accepted; anything else would miss on lookup.
pub(crate) fn parse_id(field: &str, raw: &str) -> AppResult<Uuid> {
    if raw.trim().is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    match Uuid::try_parse(raw) {
        Ok(id) if id.hyphenated().to_string() == raw => Ok(id),
        _ => Err(AppError::bad_request(format!("{field} is not a valid id"))),
    }
}

/// Stateless composition of rooms, messages and identities.
#[derive(Clone)]
pub struct ChatService {
    rooms: RoomDirectory,
    messages: MessageStore,
    directory: Arc<dyn IdentityDirectory>,
}

impl ChatService {
    pub fn new(db_pool: SqlitePool, directory: Arc<dyn IdentityDirectory>) -> Self {
        ChatService {
            rooms: RoomDirectory::new(db_pool.clone()),
            messages: MessageStore::new(db_pool),
            directory,
        }
    }

    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    /// Students and tutors matching the filter, minus the caller.
    pub async fn get_contacts(&self, filter: &SearchFilter, caller_id: Option<&str>) -> AppResult<Vec<Participant>> {
        let Some(caller_id) = caller_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Err(AppError::bad_request("userId is required"));
        };

        let mut contacts = self.directory.search(ParticipantKind::Student, filter, caller_id).await?;
        contacts.extend(self.directory.search(ParticipantKind::Tutor, filter, caller_id).await?);

        if contacts.is_empty() {
            return Err(AppError::not_found("No contacts found"));
        }
        Ok(contacts)
    }

    pub async fn get_chats(&self, filter: &SearchFilter, caller_id: &str) -> AppResult<Vec<ChatSummary>> {
        self.chats_for(filter, caller_id, ParticipantKind::Student).await
    }

    /// Same listing anchored on the tutor side; the id is checked up front.
    pub async fn get_tutor_chats(&self, filter: &SearchFilter, tutor_id: &str) -> AppResult<Vec<ChatSummary>> {
        parse_id("tutorId", tutor_id)?;
        self.chats_for(filter, tutor_id, ParticipantKind::Tutor).await
    }

    async fn chats_for(
        &self,
        filter: &SearchFilter,
        caller_id: &str,
        kind: ParticipantKind,
    ) -> AppResult<Vec<ChatSummary>> {
        let rooms = self.rooms.rooms_for(caller_id, kind).await?;
        if rooms.is_empty() {
            return Err(AppError::not_found("No chats found"));
        }

        let mut chats = Vec::with_capacity(rooms.len());
        for room in rooms {
            let counterpart = self.counterpart(&room, caller_id).await?;
            if !filter.matches(&counterpart.display_name) {
                continue;
            }

            let last = match &room.last_message_id {
                Some(id) => self.messages.find(id).await?,
                None => None,
            };
            chats.push(ChatSummary {
                unread_count: self.messages.count_unread(&room.id, caller_id).await?,
                room_id: room.id,
                counterpart_id: counterpart.id,
                counterpart_display_name: counterpart.display_name,
                counterpart_picture: counterpart.profile_picture,
                last_message_text: last.as_ref().map(|m| m.text.clone()),
                last_message_at: last.map(|m| m.sent_at),
            });
        }
        Ok(chats)
    }

    /// Get-or-create the room between caller and counterpart.
    pub async fn get_room(&self, counterpart_id: &str, caller_id: &str) -> AppResult<Room> {
        parse_id("receiverId", counterpart_id)?;
        parse_id("senderId", caller_id)?;

        let caller = self.require_identity(caller_id).await?;
        let counterpart = self.require_identity(counterpart_id).await?;
        self.rooms.get_or_create(&caller, &counterpart).await
    }

    pub async fn get_room_message(&self, room_id: &str, caller_id: &str) -> AppResult<Conversation> {
        parse_id("roomId", room_id)?;
        parse_id("userId", caller_id)?;

        let room = self.rooms.get_room_by_id(room_id).await?;
        let counterpart = self.counterpart(&room, caller_id).await?;
        let caller = match self.directory.resolve(caller_id).await? {
            Some(caller) => caller,
            None => match room.participants.iter().find(|m| m.id == caller_id) {
                Some(member) => placeholder(member),
                None => Participant {
                    id: caller_id.to_owned(),
                    kind: None,
                    display_name: String::new(),
                    profile_picture: None,
                    email: None,
                    is_blocked: false,
                },
            },
        };

        let messages = self.messages.list_by_room(&room.id).await?;
        let last_message = room
            .last_message_id
            .as_ref()
            .and_then(|id| messages.iter().rev().find(|m| &m.id == id))
            .cloned();

        Ok(Conversation {
            id: room.id,
            name: counterpart.display_name.clone(),
            profile_picture: counterpart.profile_picture.clone(),
            participants: [caller, counterpart],
            messages,
            last_message,
        })
    }

    pub async fn unread_count(&self, room_id: &str, participant_id: &str) -> AppResult<i64> {
        parse_id("roomId", room_id)?;
        let room = self.rooms.get_room_by_id(room_id).await?;
        self.messages.count_unread(&room.id, participant_id).await
    }

    pub async fn mark_read(&self, room_id: &str, reader_id: &str) -> AppResult<u64> {
        parse_id("roomId", room_id)?;
        let room = self.rooms.get_room_by_id(room_id).await?;
        if !room.has_member(reader_id) {
            return Err(AppError::forbidden("not a participant of this room"));
        }
        self.messages.mark_read(&room.id, reader_id).await
    }

    /// Persists a message from one room member and returns it along with
    /// the id of the member who should receive it.
    pub async fn send_message(&self, msg: NewMessage) -> AppResult<(Message, String)> {
        let room = match self.rooms.get_room_by_id(&msg.room_id).await {
            Err(AppError::NotFound(_)) => {
                return Err(AppError::bad_request(format!("unknown room {}", msg.room_id)));
            }
            other => other?,
        };
        if !room.has_member(&msg.sender_id) {
            return Err(AppError::bad_request("sender is not a participant of this room"));
        }
        let recipient = room.counterpart_of(&msg.sender_id)?.id.clone();

        let message = self.messages.append(msg).await?;
        Ok((message, recipient))
    }

    async fn require_identity(&self, id: &str) -> AppResult<Participant> {
        self.directory
            .resolve(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("participant {id} not found")))
    }

    /// Fresh display identity of the other member. A successful lookup
    /// refreshes the room's cached label for that member; when the directory
    /// no longer knows them, that cached label is all there is.
    async fn counterpart(&self, room: &Room, caller_id: &str) -> AppResult<Participant> {
        let member = room.counterpart_of(caller_id)?;
        let Some(found) = self.directory.find_by_id(member.kind, &member.id).await? else {
            return Ok(placeholder(member));
        };
        if let Err(err) = self.rooms.refresh_label(room, member, &found).await {
            tracing::warn!(room_id = %room.id, member = %member.id, %err, "could not refresh cached label");
        }
        Ok(found)
    }
}

fn placeholder(member: &RoomMember) -> Participant {
    Participant {
        id: member.id.clone(),
        kind: Some(member.kind),
        display_name: member.display_name.clone(),
        profile_picture: member.display_picture.clone(),
        email: None,
        is_blocked: false,
    }
}
