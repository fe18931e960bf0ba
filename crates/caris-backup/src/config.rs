//! Backup subsystem configuration
//!
//! Deserialized from the daemon's figment stack (`caris.toml` plus
//! `CARIS_`-prefixed environment variables). Every field has a default so
//! a bare config file still yields a working local setup.

use crate::retention::RetentionPolicy;
use crate::scheduler::ScheduleConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level backup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Root directory for backup artifacts and metadata
    pub base_dir: PathBuf,
    /// PostgreSQL connection URL passed to `pg_dump` and `psql`
    pub database_url: String,
    /// Uploaded-file tree to archive
    pub uploads_dir: PathBuf,
    /// Run the gzip stage
    pub compress: bool,
    /// Subprocess timeout for `pg_dump` / `psql`, in seconds
    pub subprocess_timeout_secs: u64,
    /// Encryption settings; absent means plaintext artifacts
    pub encryption: Option<EncryptionConfig>,
    /// Retention policy applied by the daily cleanup job
    pub retention: RetentionPolicy,
    /// Cron expressions for the scheduled jobs
    pub schedules: ScheduleConfig,
    /// Notification channels
    pub notifications: NotificationConfig,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./backups"),
            database_url: "postgresql://localhost/caris".into(),
            uploads_dir: PathBuf::from("./uploads"),
            compress: true,
            subprocess_timeout_secs: 1800,
            encryption: None,
            retention: RetentionPolicy::default(),
            schedules: ScheduleConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl BackupConfig {
    /// Directory holding database backup artifacts
    pub fn database_backup_dir(&self) -> PathBuf {
        self.base_dir.join("database")
    }

    /// Directory holding file backup archives
    pub fn file_backup_dir(&self) -> PathBuf {
        self.base_dir.join("files")
    }

    /// Directory holding the JSON metadata documents
    pub fn metadata_dir(&self) -> PathBuf {
        self.base_dir.join("metadata")
    }

    /// Scratch directory for restore staging
    pub fn restore_temp_dir(&self) -> PathBuf {
        self.base_dir.join("restore-tmp")
    }
}

/// Key derivation inputs for artifact encryption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Secret passphrase; the AES key is derived from it with scrypt
    pub secret: String,
    /// Derivation salt, fixed per deployment
    pub salt: String,
}

/// Notification channel settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// SMTP email channel; absent disables email
    pub email: Option<EmailConfig>,
    /// Webhook channel; absent disables webhooks
    pub webhook: Option<WebhookConfig>,
}

/// SMTP settings for the email channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host
    pub smtp_host: String,
    /// From address
    pub from: String,
    /// Recipient address
    pub to: String,
}

/// Settings for the webhook channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook endpoint URL
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_self_contained() {
        let config = BackupConfig::default();
        assert!(config.compress);
        assert!(config.encryption.is_none());
        assert!(config.notifications.email.is_none());
        assert!(config.notifications.webhook.is_none());
        assert_eq!(config.subprocess_timeout_secs, 1800);
        assert_eq!(config.metadata_dir(), PathBuf::from("./backups/metadata"));
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let toml = r#"
            base_dir = "/var/lib/caris/backups"
            [encryption]
            secret = "hunter2"
            salt = "caris-prod"
        "#;
        let config: BackupConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/var/lib/caris/backups"));
        assert!(config.compress, "unset fields fall back to defaults");
        let enc = config.encryption.unwrap();
        assert_eq!(enc.secret, "hunter2");
    }
}
