//! Encrypted conversation backups for CÁRIS
//!
//! User-initiated snapshot, export and restore of one chat room's history,
//! on a lifecycle independent from the disk-level database and file
//! backups. Each snapshot is serialized to JSON and envelope-encrypted
//! under a key generated for that backup alone.
//!
//! The chat CRUD layer is external; this crate talks to it through the
//! [`store::ConversationStore`] and [`store::BackupStore`] traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod export;
pub mod service;
pub mod store;
pub mod types;

pub use error::{ConversationError, ConversationResult};
pub use service::{ConversationBackupService, RestoreOutcome};
pub use store::{BackupStore, ConversationStore, InMemoryBackupStore, InMemoryConversationStore};
pub use types::{
    ChatAttachment, ChatMessage, ConversationBackup, ConversationBackupType, ExportFormat,
    RoomSnapshot,
};
