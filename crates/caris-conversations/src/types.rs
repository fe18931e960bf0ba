//! Conversation backup data model
//!
//! A backup is a [`RoomSnapshot`] serialized to JSON and envelope-encrypted
//! under a key generated for that backup alone. The persisted
//! [`ConversationBackup`] record carries the ciphertext, the exported key
//! and the snapshot counts; everything else lives inside the ciphertext.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One chat message as captured in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message id
    pub id: Uuid,
    /// Author's user id
    pub sender_id: Uuid,
    /// Author's display name at snapshot time
    pub sender_name: String,
    /// Message body
    pub content: String,
    /// When the message was sent
    pub sent_at: DateTime<Utc>,
    /// Whether the message was marked for automatic expiry
    pub ephemeral: bool,
}

/// One uploaded file attached to a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAttachment {
    /// Attachment id
    pub id: Uuid,
    /// Original filename
    pub filename: String,
    /// Path in file storage
    pub storage_path: String,
    /// Uploader's user id
    pub uploaded_by: Uuid,
    /// Upload time
    pub uploaded_at: DateTime<Utc>,
}

/// The decrypted payload of a conversation backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Room the snapshot was taken from
    pub room_id: Uuid,
    /// Room display name at snapshot time
    pub room_name: String,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
    /// All non-deleted messages, oldest first
    pub messages: Vec<ChatMessage>,
    /// All attached files
    pub attachments: Vec<ChatAttachment>,
}

/// Kind of conversation backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationBackupType {
    /// Complete room history
    Full,
}

/// Persisted record of one encrypted conversation backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationBackup {
    /// Backup id
    pub id: Uuid,
    /// User who requested the backup
    pub owner_id: Uuid,
    /// Room the backup was taken from
    pub room_id: Uuid,
    /// Encrypted snapshot (IV-prefixed AES envelope)
    #[serde(with = "serde_bytes_base64")]
    pub ciphertext: Vec<u8>,
    /// Kind of backup
    pub backup_type: ConversationBackupType,
    /// Base64 export of the backup-specific key
    pub exported_key: String,
    /// Number of messages in the snapshot
    pub message_count: u32,
    /// Number of attached files in the snapshot
    pub file_count: u32,
    /// When the backup was created
    pub created_at: DateTime<Utc>,
}

/// Export rendering for user download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Raw decrypted snapshot as pretty-printed JSON
    Json,
    /// Human-readable transcript
    Text,
}

/// Base64 codec for the ciphertext field, keeping the serialized record
/// readable in JSON-backed stores
mod serde_bytes_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
