//! Conversation backup, restore and export
//!
//! Each backup is encrypted under its own freshly generated key, never a
//! live room transport key, so deleting a backup revokes nothing and
//! leaking a room key exposes no backups. The exported key is persisted
//! next to the ciphertext so an operator can always recover a user's
//! history; the tradeoff is that it protects only against casual
//! inspection, not against an attacker with store access.

use crate::error::{ConversationError, ConversationResult};
use crate::export;
use crate::store::{BackupStore, ConversationStore};
use crate::types::{
    ChatAttachment, ChatMessage, ConversationBackup, ConversationBackupType, ExportFormat,
    RoomSnapshot,
};
use caris_crypto::SymmetricKey;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outcome of a conversation restore
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    /// Room the snapshot was materialized into
    pub room_id: Uuid,
    /// Number of restored messages
    pub messages_restored: u32,
    /// Number of restored attachment records
    pub files_restored: u32,
    /// Non-fatal findings
    pub warnings: Vec<String>,
}

/// User-initiated encrypted backup/export/restore of one room's history
pub struct ConversationBackupService {
    conversations: Arc<dyn ConversationStore>,
    backups: Arc<dyn BackupStore>,
}

impl ConversationBackupService {
    /// Create a service over the given storage seams
    pub fn new(conversations: Arc<dyn ConversationStore>, backups: Arc<dyn BackupStore>) -> Self {
        Self {
            conversations,
            backups,
        }
    }

    /// Snapshot a room's full history into an encrypted backup
    ///
    /// The requester must be a current participant of the room.
    #[instrument(skip(self))]
    pub async fn create_full_backup(
        &self,
        owner_id: Uuid,
        room_id: Uuid,
    ) -> ConversationResult<ConversationBackup> {
        if !self.conversations.is_participant(room_id, owner_id).await? {
            return Err(ConversationError::unauthorized(format!(
                "user {} is not a participant of room {}",
                owner_id, room_id
            )));
        }

        let snapshot = RoomSnapshot {
            room_id,
            room_name: self.conversations.room_name(room_id).await?,
            taken_at: Utc::now(),
            messages: self.conversations.messages(room_id).await?,
            attachments: self.conversations.attachments(room_id).await?,
        };

        let plain = serde_json::to_vec(&snapshot)?;
        let key = SymmetricKey::generate();
        let ciphertext = caris_crypto::encrypt(&key, &plain);

        let backup = ConversationBackup {
            id: Uuid::new_v4(),
            owner_id,
            room_id,
            ciphertext,
            backup_type: ConversationBackupType::Full,
            exported_key: key.export(),
            message_count: snapshot.messages.len() as u32,
            file_count: snapshot.attachments.len() as u32,
            created_at: Utc::now(),
        };
        self.backups.save(&backup).await?;

        info!(
            "💾 Conversation backup {} created for room {} ({} messages, {} files)",
            backup.id, room_id, backup.message_count, backup.file_count
        );
        Ok(backup)
    }

    /// Materialize a backup into a new room, or merge it into an existing
    /// one when `target_room_id` is given
    ///
    /// Restored messages are made permanent even if the originals were
    /// ephemeral. Restored attachments get placeholder storage paths; the
    /// actual file bytes live in file-tree backups and need a separate
    /// copy step, surfaced as a warning.
    #[instrument(skip(self))]
    pub async fn restore_backup(
        &self,
        backup_id: Uuid,
        owner_id: Uuid,
        target_room_id: Option<Uuid>,
    ) -> ConversationResult<RestoreOutcome> {
        let backup = self.owned_backup(backup_id, owner_id).await?;
        let snapshot = decrypt_snapshot(&backup)?;

        let room_id = match target_room_id {
            Some(existing) => {
                if !self.conversations.is_participant(existing, owner_id).await? {
                    return Err(ConversationError::unauthorized(format!(
                        "user {} is not a participant of room {}",
                        owner_id, existing
                    )));
                }
                existing
            }
            None => {
                let name = format!("{} (restored)", snapshot.room_name);
                self.conversations.create_room(&name, owner_id).await?
            }
        };

        let mut outcome = RestoreOutcome {
            room_id,
            messages_restored: 0,
            files_restored: 0,
            warnings: Vec::new(),
        };

        for message in snapshot.messages {
            // Fresh ids so a merge never collides with live rows
            self.conversations
                .insert_message(
                    room_id,
                    ChatMessage {
                        id: Uuid::new_v4(),
                        ephemeral: false,
                        ..message
                    },
                )
                .await?;
            outcome.messages_restored += 1;
        }

        for attachment in snapshot.attachments {
            let placeholder = format!("pending-restore/{}", attachment.filename);
            self.conversations
                .insert_attachment(
                    room_id,
                    ChatAttachment {
                        id: Uuid::new_v4(),
                        storage_path: placeholder,
                        ..attachment
                    },
                )
                .await?;
            outcome.files_restored += 1;
        }

        if outcome.files_restored > 0 {
            let notice = format!(
                "{} restored file(s) have placeholder storage paths; file contents must be copied from a file-tree backup",
                outcome.files_restored
            );
            warn!("{}", notice);
            outcome.warnings.push(notice);
        }

        info!(
            "🔄 Conversation backup {} restored into room {} ({} messages)",
            backup_id, room_id, outcome.messages_restored
        );
        Ok(outcome)
    }

    /// Decrypt a backup and render it for user download
    #[instrument(skip(self))]
    pub async fn export_backup(
        &self,
        backup_id: Uuid,
        owner_id: Uuid,
        format: ExportFormat,
    ) -> ConversationResult<String> {
        let backup = self.owned_backup(backup_id, owner_id).await?;
        let snapshot = decrypt_snapshot(&backup)?;

        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&snapshot)?),
            ExportFormat::Text => Ok(export::render_transcript(&snapshot)),
        }
    }

    /// All backups owned by a user, newest first
    pub async fn list_backups(&self, owner_id: Uuid) -> ConversationResult<Vec<ConversationBackup>> {
        self.backups.list_for_owner(owner_id).await
    }

    /// Delete a backup on explicit user request
    #[instrument(skip(self))]
    pub async fn delete_backup(&self, backup_id: Uuid, owner_id: Uuid) -> ConversationResult<()> {
        self.owned_backup(backup_id, owner_id).await?;
        self.backups.delete(backup_id).await?;
        info!("🗑 Conversation backup {} deleted", backup_id);
        Ok(())
    }

    async fn owned_backup(
        &self,
        backup_id: Uuid,
        owner_id: Uuid,
    ) -> ConversationResult<ConversationBackup> {
        let backup = self.backups.load(backup_id).await?;
        if backup.owner_id != owner_id {
            return Err(ConversationError::unauthorized(format!(
                "backup {} is not owned by user {}",
                backup_id, owner_id
            )));
        }
        Ok(backup)
    }
}

fn decrypt_snapshot(backup: &ConversationBackup) -> ConversationResult<RoomSnapshot> {
    let key = SymmetricKey::import(&backup.exported_key)?;
    let plain = caris_crypto::decrypt(&key, &backup.ciphertext)?;
    Ok(serde_json::from_slice(&plain)?)
}
