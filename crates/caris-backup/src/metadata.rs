//! Backup metadata records and their on-disk store
//!
//! One JSON document exists per backup id, written independently of the
//! artifact file. Documents are written via a temp file followed by a
//! rename, so a crashed writer never leaves a partially written record.
//! A record is never deleted without its artifact, and vice versa; the only
//! deletion path is [`MetadataStore::remove`], which takes both down
//! together.

use crate::error::{BackupError, BackupResult};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Kind of backup captured by an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    /// Complete point-in-time copy of the target
    Full,
    /// Schema-only snapshot of changes since a prior backup
    Incremental,
}

/// What the artifact contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupTarget {
    /// The primary relational store
    Database,
    /// The uploaded-file tree
    Files,
}

impl BackupTarget {
    /// Short prefix used in backup ids and artifact names
    pub fn prefix(&self) -> &'static str {
        match self {
            BackupTarget::Database => "db",
            BackupTarget::Files => "files",
        }
    }
}

/// Lifecycle status of a backup
///
/// `Pending` transitions to `Completed` or `Failed` exactly once at job
/// end; `Completed` becomes `Verified` only through an explicit verify
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    /// Job started, artifact not yet final
    Pending,
    /// Artifact written and checksummed
    Completed,
    /// A pipeline stage failed; `error` holds the raw cause
    Failed,
    /// Checksum re-verified after completion
    Verified,
}

/// Metadata record describing one backup artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Unique backup id (timestamp plus random suffix)
    pub id: String,
    /// When the backup job started
    pub timestamp: DateTime<Utc>,
    /// Full or incremental
    pub backup_type: BackupType,
    /// Database or file-tree backup
    pub target: BackupTarget,
    /// Size in bytes of the final artifact
    pub size: u64,
    /// Whether the gzip stage ran
    pub compressed: bool,
    /// Whether the encryption stage ran
    pub encrypted: bool,
    /// SHA-256 of the final artifact (post-compress, post-encrypt)
    pub checksum: String,
    /// Path of the final artifact on disk
    pub file_path: PathBuf,
    /// Lifecycle status
    pub status: BackupStatus,
    /// Raw error text when status is `Failed`
    pub error: Option<String>,
}

impl BackupMetadata {
    /// Create a pending record for a job that just started
    pub fn pending(target: BackupTarget, backup_type: BackupType) -> Self {
        let timestamp = Utc::now();
        Self {
            id: generate_backup_id(target, timestamp),
            timestamp,
            backup_type,
            target,
            size: 0,
            compressed: false,
            encrypted: false,
            checksum: String::new(),
            file_path: PathBuf::new(),
            status: BackupStatus::Pending,
            error: None,
        }
    }
}

/// Generate a backup id from the job timestamp
///
/// A random 4-byte suffix removes the same-millisecond collision risk of a
/// purely time-based id.
pub fn generate_backup_id(target: BackupTarget, timestamp: DateTime<Utc>) -> String {
    let mut suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!(
        "{}_{}_{}",
        target.prefix(),
        timestamp.format("%Y%m%dT%H%M%S%3f"),
        hex::encode(suffix)
    )
}

/// Directory-backed store of backup metadata documents
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    /// Open (and create if needed) a metadata store under `dir`
    pub fn open(dir: impl Into<PathBuf>) -> BackupResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn doc_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Persist a record, replacing any previous version for the same id
    pub fn save(&self, metadata: &BackupMetadata) -> BackupResult<()> {
        let path = self.doc_path(&metadata.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(metadata)?)?;
        fs::rename(&tmp, &path)?;
        debug!("📝 Saved backup metadata: {}", metadata.id);
        Ok(())
    }

    /// Load the record for a backup id
    pub fn load(&self, id: &str) -> BackupResult<BackupMetadata> {
        let path = self.doc_path(id);
        let data = fs::read(&path)
            .map_err(|_| BackupError::not_found(format!("backup {}", id)))?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// All records, sorted by timestamp descending
    pub fn list(&self) -> BackupResult<Vec<BackupMetadata>> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let data = fs::read(&path)?;
                match serde_json::from_slice::<BackupMetadata>(&data) {
                    Ok(record) => records.push(record),
                    Err(e) => debug!("Skipping unreadable metadata {:?}: {}", path, e),
                }
            }
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    /// Records for one target, sorted by timestamp descending
    pub fn list_for_target(&self, target: BackupTarget) -> BackupResult<Vec<BackupMetadata>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|m| m.target == target)
            .collect())
    }

    /// Delete a backup: artifact first, then its metadata document
    ///
    /// Tolerates an already-missing artifact (failed backups may never have
    /// produced one).
    pub fn remove(&self, metadata: &BackupMetadata) -> BackupResult<()> {
        if metadata.file_path.as_os_str().is_empty() {
            // Failed before any artifact was written
        } else if let Err(e) = fs::remove_file(&metadata.file_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }

        fs::remove_file(self.doc_path(&metadata.id))?;
        info!("🗑 Removed backup {}", metadata.id);
        Ok(())
    }

    /// Store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Aggregate statistics for one slice of the backup set
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeStats {
    /// Number of backups
    pub count: usize,
    /// Combined artifact size in bytes
    pub total_size: u64,
    /// Oldest backup timestamp
    pub oldest: Option<DateTime<Utc>>,
    /// Newest backup timestamp
    pub newest: Option<DateTime<Utc>>,
}

impl TypeStats {
    fn add(&mut self, m: &BackupMetadata) {
        self.count += 1;
        self.total_size += m.size;
        self.oldest = Some(match self.oldest {
            Some(t) => t.min(m.timestamp),
            None => m.timestamp,
        });
        self.newest = Some(match self.newest {
            Some(t) => t.max(m.timestamp),
            None => m.timestamp,
        });
    }
}

/// Storage statistics broken down by backup type
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    /// All backups
    pub total: TypeStats,
    /// Full backups only
    pub full: TypeStats,
    /// Incremental backups only
    pub incremental: TypeStats,
}

impl StorageStats {
    /// Compute stats over a list of metadata records
    pub fn compute(backups: &[BackupMetadata]) -> Self {
        let mut stats = Self::default();
        for m in backups {
            stats.total.add(m);
            match m.backup_type {
                BackupType::Full => stats.full.add(m),
                BackupType::Incremental => stats.incremental.add(m),
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(target: BackupTarget) -> BackupMetadata {
        BackupMetadata::pending(target, BackupType::Full)
    }

    #[test]
    fn test_id_format_and_uniqueness() {
        let now = Utc::now();
        let a = generate_backup_id(BackupTarget::Database, now);
        let b = generate_backup_id(BackupTarget::Database, now);
        assert!(a.starts_with("db_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();

        let mut meta = sample(BackupTarget::Database);
        meta.status = BackupStatus::Completed;
        meta.checksum = "abc123".into();
        store.save(&meta).unwrap();

        let loaded = store.load(&meta.id).unwrap();
        assert_eq!(loaded.id, meta.id);
        assert_eq!(loaded.status, BackupStatus::Completed);
        assert_eq!(loaded.checksum, "abc123");
    }

    #[test]
    fn test_load_unknown_id() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load("db_nope"),
            Err(BackupError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_sorted_descending() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();

        for offset in [3i64, 1, 2] {
            let mut meta = sample(BackupTarget::Database);
            meta.timestamp = Utc::now() - chrono::Duration::days(offset);
            meta.id = generate_backup_id(BackupTarget::Database, meta.timestamp);
            store.save(&meta).unwrap();
        }

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed[0].timestamp > listed[1].timestamp);
        assert!(listed[1].timestamp > listed[2].timestamp);
    }

    #[test]
    fn test_remove_deletes_artifact_and_record() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("meta")).unwrap();

        let artifact = dir.path().join("db_x.sql.gz.enc");
        std::fs::write(&artifact, b"ciphertext").unwrap();

        let mut meta = sample(BackupTarget::Database);
        meta.file_path = artifact.clone();
        store.save(&meta).unwrap();

        store.remove(&meta).unwrap();
        assert!(!artifact.exists());
        assert!(store.load(&meta.id).is_err());
    }

    #[test]
    fn test_remove_tolerates_missing_artifact() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();

        let mut meta = sample(BackupTarget::Files);
        meta.file_path = dir.path().join("never-written.tar.gz");
        meta.status = BackupStatus::Failed;
        store.save(&meta).unwrap();

        store.remove(&meta).unwrap();
        assert!(store.load(&meta.id).is_err());
    }

    #[test]
    fn test_storage_stats_by_type() {
        let now = Utc::now();
        let mut full = sample(BackupTarget::Database);
        full.size = 1000;
        full.timestamp = now - chrono::Duration::days(2);

        let mut incr = sample(BackupTarget::Database);
        incr.backup_type = BackupType::Incremental;
        incr.size = 50;
        incr.timestamp = now;

        let stats = StorageStats::compute(&[full.clone(), incr.clone()]);
        assert_eq!(stats.total.count, 2);
        assert_eq!(stats.total.total_size, 1050);
        assert_eq!(stats.full.count, 1);
        assert_eq!(stats.incremental.total_size, 50);
        assert_eq!(stats.total.oldest, Some(full.timestamp));
        assert_eq!(stats.total.newest, Some(incr.timestamp));
    }
}
