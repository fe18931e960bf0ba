//! Storage seams for conversation backups
//!
//! The chat CRUD layer lives outside this crate; [`ConversationStore`] and
//! [`BackupStore`] are its contract. The in-memory implementations back
//! the tests and small deployments.

use crate::error::{ConversationError, ConversationResult};
use crate::types::{ChatAttachment, ChatMessage, ConversationBackup};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Read/write access to chat rooms, messages and attachments
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Display name of a room
    async fn room_name(&self, room_id: Uuid) -> ConversationResult<String>;

    /// Whether `user_id` is a current participant of the room
    async fn is_participant(&self, room_id: Uuid, user_id: Uuid) -> ConversationResult<bool>;

    /// All non-deleted messages of a room, oldest first
    async fn messages(&self, room_id: Uuid) -> ConversationResult<Vec<ChatMessage>>;

    /// All files attached to a room
    async fn attachments(&self, room_id: Uuid) -> ConversationResult<Vec<ChatAttachment>>;

    /// Create a room owned by `owner_id`, returning its id
    async fn create_room(&self, name: &str, owner_id: Uuid) -> ConversationResult<Uuid>;

    /// Insert a message into a room
    async fn insert_message(&self, room_id: Uuid, message: ChatMessage)
        -> ConversationResult<()>;

    /// Insert an attachment record into a room
    async fn insert_attachment(
        &self,
        room_id: Uuid,
        attachment: ChatAttachment,
    ) -> ConversationResult<()>;
}

/// Persistence for encrypted conversation backup records
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Persist a backup record
    async fn save(&self, backup: &ConversationBackup) -> ConversationResult<()>;

    /// Load a backup record by id
    async fn load(&self, id: Uuid) -> ConversationResult<ConversationBackup>;

    /// All backups owned by a user, newest first
    async fn list_for_owner(&self, owner_id: Uuid) -> ConversationResult<Vec<ConversationBackup>>;

    /// Delete a backup record
    async fn delete(&self, id: Uuid) -> ConversationResult<()>;
}

#[derive(Debug, Default)]
struct RoomState {
    name: String,
    participants: Vec<Uuid>,
    messages: Vec<ChatMessage>,
    attachments: Vec<ChatAttachment>,
}

/// In-memory [`ConversationStore`]
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    rooms: RwLock<HashMap<Uuid, RoomState>>,
}

impl InMemoryConversationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a room with the given participants, returning its id
    pub async fn add_room(&self, name: &str, participants: &[Uuid]) -> Uuid {
        let id = Uuid::new_v4();
        self.rooms.write().await.insert(
            id,
            RoomState {
                name: name.to_string(),
                participants: participants.to_vec(),
                ..RoomState::default()
            },
        );
        id
    }

    /// Seed a message into an existing room
    pub async fn add_message(&self, room_id: Uuid, message: ChatMessage) {
        if let Some(room) = self.rooms.write().await.get_mut(&room_id) {
            room.messages.push(message);
        }
    }

    /// Seed an attachment into an existing room
    pub async fn add_attachment(&self, room_id: Uuid, attachment: ChatAttachment) {
        if let Some(room) = self.rooms.write().await.get_mut(&room_id) {
            room.attachments.push(attachment);
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn room_name(&self, room_id: Uuid) -> ConversationResult<String> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(|room| room.name.clone())
            .ok_or_else(|| ConversationError::not_found(format!("room {}", room_id)))
    }

    async fn is_participant(&self, room_id: Uuid, user_id: Uuid) -> ConversationResult<bool> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(|room| room.participants.contains(&user_id))
            .ok_or_else(|| ConversationError::not_found(format!("room {}", room_id)))
    }

    async fn messages(&self, room_id: Uuid) -> ConversationResult<Vec<ChatMessage>> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(|room| room.messages.clone())
            .ok_or_else(|| ConversationError::not_found(format!("room {}", room_id)))
    }

    async fn attachments(&self, room_id: Uuid) -> ConversationResult<Vec<ChatAttachment>> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(|room| room.attachments.clone())
            .ok_or_else(|| ConversationError::not_found(format!("room {}", room_id)))
    }

    async fn create_room(&self, name: &str, owner_id: Uuid) -> ConversationResult<Uuid> {
        Ok(self.add_room(name, &[owner_id]).await)
    }

    async fn insert_message(
        &self,
        room_id: Uuid,
        message: ChatMessage,
    ) -> ConversationResult<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(&room_id)
            .ok_or_else(|| ConversationError::not_found(format!("room {}", room_id)))?;
        room.messages.push(message);
        Ok(())
    }

    async fn insert_attachment(
        &self,
        room_id: Uuid,
        attachment: ChatAttachment,
    ) -> ConversationResult<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(&room_id)
            .ok_or_else(|| ConversationError::not_found(format!("room {}", room_id)))?;
        room.attachments.push(attachment);
        Ok(())
    }
}

/// In-memory [`BackupStore`]
#[derive(Debug, Default)]
pub struct InMemoryBackupStore {
    backups: RwLock<HashMap<Uuid, ConversationBackup>>,
}

impl InMemoryBackupStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackupStore for InMemoryBackupStore {
    async fn save(&self, backup: &ConversationBackup) -> ConversationResult<()> {
        self.backups.write().await.insert(backup.id, backup.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ConversationResult<ConversationBackup> {
        self.backups
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ConversationError::not_found(format!("backup {}", id)))
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> ConversationResult<Vec<ConversationBackup>> {
        let mut backups: Vec<_> = self
            .backups
            .read()
            .await
            .values()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    async fn delete(&self, id: Uuid) -> ConversationResult<()> {
        self.backups
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ConversationError::not_found(format!("backup {}", id)))
    }
}
