//! Database backup backend
//!
//! Runs the dump → compress → encrypt → checksum → metadata pipeline
//! against the primary relational store. Each stage consumes and deletes
//! its predecessor's file, so no plaintext or uncompressed intermediate
//! survives once a later stage has run. A failed stage still persists the
//! metadata record with status `Failed` and the raw error text before the
//! error propagates to the caller.

use crate::error::{BackupError, BackupResult};
use crate::metadata::{
    BackupMetadata, BackupStatus, BackupTarget, BackupType, MetadataStore, StorageStats,
};
use crate::retention::{self, RetentionPolicy};
use crate::utils::BackupUtils;
use async_trait::async_trait;
use caris_crypto::SymmetricKey;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, instrument, warn};

/// What a dump should capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    /// Complete data dump
    Full,
    /// Schema-only dump (the incremental backup path)
    SchemaOnly,
}

/// Narrow seam over the database engine's dump/restore tooling
///
/// Keeps the compress/encrypt/retention/verify logic independent of the
/// specific CLI and lets tests substitute a fake driver.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Dump the primary database into `dest`
    async fn dump(&self, dest: &Path, mode: DumpMode) -> BackupResult<()>;

    /// Restore a plain SQL dump at `src` into `target_database`, overwriting
    /// existing data
    async fn restore(&self, src: &Path, target_database: &str) -> BackupResult<()>;
}

/// PostgreSQL driver shelling out to `pg_dump` / `psql`
///
/// Every subprocess runs under a deadline; a stuck dump or restore is
/// killed and reported as a timeout instead of blocking the job forever.
#[derive(Debug, Clone)]
pub struct PgDriver {
    database_url: String,
    timeout: Duration,
}

impl PgDriver {
    /// Create a driver for the given connection URL
    pub fn new(database_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            database_url: database_url.into(),
            timeout,
        }
    }

    async fn run_tool(&self, mut command: Command, what: &str) -> BackupResult<()> {
        command.stdout(Stdio::null()).stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                BackupError::Timeout(format!("{} exceeded {:?}", what, self.timeout))
            })?
            .map_err(|e| BackupError::database(format!("failed to spawn {}: {}", what, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackupError::database(format!(
                "{} exited with {}: {}",
                what,
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl DatabaseDriver for PgDriver {
    #[instrument(skip(self))]
    async fn dump(&self, dest: &Path, mode: DumpMode) -> BackupResult<()> {
        info!("🐘 Running pg_dump ({:?}) to {:?}", mode, dest);

        let mut command = Command::new("pg_dump");
        command
            .arg("--dbname")
            .arg(&self.database_url)
            .arg("--format")
            .arg("plain")
            .arg("--file")
            .arg(dest);
        if mode == DumpMode::SchemaOnly {
            command.arg("--schema-only");
        }

        self.run_tool(command, "pg_dump").await
    }

    #[instrument(skip(self))]
    async fn restore(&self, src: &Path, target_database: &str) -> BackupResult<()> {
        info!("🐘 Restoring {:?} into {}", src, target_database);

        let mut command = Command::new("psql");
        command
            .arg("--dbname")
            .arg(target_database)
            .arg("--single-transaction")
            .arg("--file")
            .arg(src);

        self.run_tool(command, "psql").await
    }
}

/// Per-run pipeline options
#[derive(Debug, Clone, Copy)]
pub struct BackupOptions {
    /// Run the gzip stage
    pub compress: bool,
    /// Run the encryption stage (requires a configured key)
    pub encrypt: bool,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            compress: true,
            encrypt: true,
        }
    }
}

/// Backend producing database backup artifacts
pub struct DatabaseBackupBackend {
    driver: Arc<dyn DatabaseDriver>,
    store: MetadataStore,
    backup_dir: PathBuf,
    key: Option<SymmetricKey>,
}

impl DatabaseBackupBackend {
    /// Create a backend writing artifacts under `backup_dir`
    pub fn new(
        driver: Arc<dyn DatabaseDriver>,
        store: MetadataStore,
        backup_dir: impl Into<PathBuf>,
        key: Option<SymmetricKey>,
    ) -> BackupResult<Self> {
        let backup_dir = backup_dir.into();
        BackupUtils::validate_backup_dir(&backup_dir)?;
        Ok(Self {
            driver,
            store,
            backup_dir,
            key,
        })
    }

    /// Create a full backup
    #[instrument(skip(self))]
    pub async fn create_full_backup(&self, opts: BackupOptions) -> BackupResult<BackupMetadata> {
        self.run_pipeline(BackupType::Full, DumpMode::Full, opts)
            .await
    }

    /// Create an incremental (schema-only) backup
    #[instrument(skip(self))]
    pub async fn create_incremental_backup(
        &self,
        opts: BackupOptions,
    ) -> BackupResult<BackupMetadata> {
        self.run_pipeline(BackupType::Incremental, DumpMode::SchemaOnly, opts)
            .await
    }

    async fn run_pipeline(
        &self,
        backup_type: BackupType,
        mode: DumpMode,
        opts: BackupOptions,
    ) -> BackupResult<BackupMetadata> {
        if opts.encrypt && self.key.is_none() {
            return Err(BackupError::config(
                "encryption requested but no backup secret is configured",
            ));
        }

        let mut metadata = BackupMetadata::pending(BackupTarget::Database, backup_type);
        info!("💾 Starting {:?} database backup {}", backup_type, metadata.id);
        self.store.save(&metadata)?;

        let outcome = match self.execute_stages(&metadata.id, mode, opts).await {
            Ok(artifact) => {
                // Record the artifact path first so a failed finalization
                // still leaves a record that `remove` can collect
                metadata.file_path = artifact.clone();
                BackupUtils::artifact_size_and_checksum(&artifact)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok((size, checksum)) => {
                metadata.compressed = opts.compress;
                metadata.encrypted = opts.encrypt;
                metadata.size = size;
                metadata.checksum = checksum;
                metadata.status = BackupStatus::Completed;
                self.store.save(&metadata)?;

                info!(
                    "✅ Database backup {} completed ({})",
                    metadata.id,
                    BackupUtils::format_size(metadata.size)
                );
                Ok(metadata)
            }
            Err(e) => {
                metadata.status = BackupStatus::Failed;
                metadata.error = Some(e.to_string());
                if let Err(save_err) = self.store.save(&metadata) {
                    warn!(
                        "Failed to persist failure record for {}: {}",
                        metadata.id, save_err
                    );
                }
                Err(e)
            }
        }
    }

    /// dump → [compress] → [encrypt]; returns the final artifact path
    ///
    /// A failed stage discards its in-flight files before the error
    /// propagates. Dumps hold unencrypted health data and must never
    /// outlive a failed pipeline run.
    async fn execute_stages(
        &self,
        id: &str,
        mode: DumpMode,
        opts: BackupOptions,
    ) -> BackupResult<PathBuf> {
        let dump_path = self.backup_dir.join(format!("{}.sql", id));
        if let Err(e) = self.driver.dump(&dump_path, mode).await {
            BackupUtils::discard_stage_files(&[&dump_path]);
            return Err(e);
        }

        let mut current = dump_path;

        if opts.compress {
            let gz_path = current.with_extension("sql.gz");
            if let Err(e) = BackupUtils::compress_file(&current, &gz_path)
                .and_then(|()| BackupUtils::remove_stage_file(&current))
            {
                BackupUtils::discard_stage_files(&[&current, &gz_path]);
                return Err(e);
            }
            current = gz_path;
        }

        if opts.encrypt {
            let Some(key) = self.key.as_ref() else {
                BackupUtils::discard_stage_files(&[&current]);
                return Err(BackupError::config("no backup key configured"));
            };
            let enc_path = PathBuf::from(format!("{}.enc", current.display()));
            if let Err(e) = caris_crypto::encrypt_file(key, &current, &enc_path)
                .map_err(BackupError::from)
                .and_then(|()| BackupUtils::remove_stage_file(&current))
            {
                BackupUtils::discard_stage_files(&[&current, &enc_path]);
                return Err(e);
            }
            current = enc_path;
        }

        Ok(current)
    }

    /// Recompute the artifact checksum and compare against the record
    ///
    /// A mismatch returns `Ok(false)` and leaves the artifact in place. On
    /// success the record is promoted to `Verified`.
    #[instrument(skip(self))]
    pub fn verify_backup(&self, id: &str) -> BackupResult<bool> {
        let mut metadata = self.store.load(id)?;

        let actual = caris_crypto::checksum_file(&metadata.file_path)?;
        if actual != metadata.checksum {
            warn!(
                "❌ Checksum mismatch for backup {}: stored {} actual {}",
                id, metadata.checksum, actual
            );
            return Ok(false);
        }

        if metadata.status == BackupStatus::Completed {
            metadata.status = BackupStatus::Verified;
            self.store.save(&metadata)?;
        }

        info!("🔍 Backup {} verified", id);
        Ok(true)
    }

    /// All database backup records, newest first
    pub fn list_backups(&self) -> BackupResult<Vec<BackupMetadata>> {
        self.store.list_for_target(BackupTarget::Database)
    }

    /// Prune backups according to the retention policy; returns the number
    /// deleted
    #[instrument(skip(self))]
    pub fn apply_retention_policy(&self, policy: &RetentionPolicy) -> BackupResult<usize> {
        retention::apply_policy(&self.store, BackupTarget::Database, policy, Utc::now())
    }

    /// Count/size/oldest/newest statistics by backup type
    pub fn get_storage_stats(&self) -> BackupResult<StorageStats> {
        Ok(StorageStats::compute(&self.list_backups()?))
    }

    /// Metadata store shared with the recovery service
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }
}
