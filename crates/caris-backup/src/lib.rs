//! Backup and disaster recovery for CÁRIS
//!
//! Implements the full backup lifecycle for a deployment's two data
//! stores: the PostgreSQL database and the uploaded-file tree.
//!
//! - [`database`] dumps the database with `pg_dump` and runs the artifact
//!   pipeline (gzip, AES envelope, SHA-256 checksum)
//! - [`files`] archives the upload tree as a tar.gz with the same
//!   encryption and checksum stages
//! - [`metadata`] persists one JSON metadata document per backup and
//!   computes storage statistics
//! - [`recovery`] restores database, file and combined backups, including
//!   point-in-time recovery to the nearest earlier snapshot
//! - [`retention`] prunes old backups into daily, weekly and monthly
//!   buckets
//! - [`scheduler`] drives the recurring jobs from cron expressions
//! - [`notify`] reports every run over email and webhook channels
//!
//! All artifacts are written under a single configured base directory;
//! [`config::BackupConfig`] describes the directory layout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod database;
pub mod error;
pub mod files;
pub mod metadata;
pub mod notify;
pub mod recovery;
pub mod retention;
pub mod scheduler;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{BackupConfig, EncryptionConfig, NotificationConfig};
pub use database::{BackupOptions, DatabaseBackupBackend, DatabaseDriver, DumpMode, PgDriver};
pub use error::{BackupError, BackupResult};
pub use files::FileBackupBackend;
pub use metadata::{
    BackupMetadata, BackupStatus, BackupTarget, BackupType, MetadataStore, StorageStats,
};
pub use notify::{AlertDispatcher, EmailNotifier, Notifier, RunSummary, WebhookNotifier};
pub use recovery::{
    FullRestoreOptions, RecoveryResult, RecoveryService, RestoreOptions, RestoreType,
};
pub use retention::RetentionPolicy;
pub use scheduler::{BackupScheduler, ScheduleConfig, SchedulerStatus};
