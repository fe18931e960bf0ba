//! Uploaded-file tree backup backend
//!
//! Same pipeline as the database backend with an archive stage in place of
//! the dump: tar the uploads tree, gzip, optionally encrypt, checksum,
//! persist metadata. The restore side extracts the archive, or only lists
//! its entries for a dry run.

use crate::error::{BackupError, BackupResult};
use crate::metadata::{
    BackupMetadata, BackupStatus, BackupTarget, BackupType, MetadataStore, StorageStats,
};
use crate::retention::{self, RetentionPolicy};
use crate::utils::BackupUtils;
use caris_crypto::SymmetricKey;
use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::{write::GzEncoder, Compression};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Name of the top-level directory inside every archive
const ARCHIVE_ROOT: &str = "uploads";

/// Backend producing archive backups of the uploaded-file tree
pub struct FileBackupBackend {
    source_dir: PathBuf,
    store: MetadataStore,
    backup_dir: PathBuf,
    key: Option<SymmetricKey>,
}

impl FileBackupBackend {
    /// Create a backend archiving `source_dir` into `backup_dir`
    pub fn new(
        source_dir: impl Into<PathBuf>,
        store: MetadataStore,
        backup_dir: impl Into<PathBuf>,
        key: Option<SymmetricKey>,
    ) -> BackupResult<Self> {
        let backup_dir = backup_dir.into();
        BackupUtils::validate_backup_dir(&backup_dir)?;
        Ok(Self {
            source_dir: source_dir.into(),
            store,
            backup_dir,
            key,
        })
    }

    /// Create a full backup of the uploaded-file tree
    #[instrument(skip(self))]
    pub async fn create_full_backup(&self, encrypt: bool) -> BackupResult<BackupMetadata> {
        if encrypt && self.key.is_none() {
            return Err(BackupError::config(
                "encryption requested but no backup secret is configured",
            ));
        }

        let mut metadata = BackupMetadata::pending(BackupTarget::Files, BackupType::Full);
        info!("💾 Starting file backup {}", metadata.id);
        self.store.save(&metadata)?;

        let outcome = match self.execute_stages(&metadata.id, encrypt) {
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
                metadata.compressed = true;
                metadata.encrypted = encrypt;
                metadata.size = size;
                metadata.checksum = checksum;
                metadata.status = BackupStatus::Completed;
                self.store.save(&metadata)?;

                info!(
                    "✅ File backup {} completed ({})",
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

    /// archive+gzip → [encrypt]; returns the final artifact path
    ///
    /// A failed stage discards its in-flight files before the error
    /// propagates so no unencrypted archive outlives a failed run.
    fn execute_stages(&self, id: &str, encrypt: bool) -> BackupResult<PathBuf> {
        if !self.source_dir.is_dir() {
            return Err(BackupError::InvalidPath(self.source_dir.clone()));
        }

        let archive_path = self.backup_dir.join(format!("{}.tar.gz", id));
        if let Err(e) = self.build_archive(&archive_path) {
            BackupUtils::discard_stage_files(&[&archive_path]);
            return Err(e);
        }

        let mut current = archive_path;

        if encrypt {
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

    fn build_archive(&self, archive_path: &Path) -> BackupResult<()> {
        let file = File::create(archive_path)?;
        let encoder = GzEncoder::new(file, Compression::best());
        let mut builder = tar::Builder::new(encoder);
        builder.append_dir_all(ARCHIVE_ROOT, &self.source_dir)?;
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(|e| BackupError::Compression(e.to_string()))?;
        Ok(())
    }

    /// List the entries of a plain `.tar.gz` archive without extracting
    pub fn list_archive_entries(archive: &Path) -> BackupResult<Vec<PathBuf>> {
        let file = File::open(archive)?;
        let mut reader = tar::Archive::new(GzDecoder::new(file));

        let mut entries = Vec::new();
        for entry in reader.entries()? {
            let entry = entry?;
            entries.push(entry.path()?.into_owned());
        }
        Ok(entries)
    }

    /// Extract a plain `.tar.gz` archive into `dest`, overwriting existing
    /// files. Returns the number of extracted entries.
    ///
    /// `unpack_in` refuses entries whose path would escape `dest`; those
    /// are skipped and do not count as restored.
    pub fn extract_archive(archive: &Path, dest: &Path) -> BackupResult<u64> {
        std::fs::create_dir_all(dest)?;

        let file = File::open(archive)?;
        let mut reader = tar::Archive::new(GzDecoder::new(file));
        reader.set_overwrite(true);

        let mut count = 0u64;
        for entry in reader.entries()? {
            let mut entry = entry?;
            if entry.unpack_in(dest)? {
                count += 1;
            } else {
                warn!("Skipping archive entry {:?}: escapes destination", entry.path()?);
            }
        }
        Ok(count)
    }

    /// Recompute the artifact checksum and compare against the record
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

    /// All file backup records, newest first
    pub fn list_backups(&self) -> BackupResult<Vec<BackupMetadata>> {
        self.store.list_for_target(BackupTarget::Files)
    }

    /// Prune backups according to the retention policy
    #[instrument(skip(self))]
    pub fn apply_retention_policy(&self, policy: &RetentionPolicy) -> BackupResult<usize> {
        retention::apply_policy(&self.store, BackupTarget::Files, policy, Utc::now())
    }

    /// Count/size/oldest/newest statistics by backup type
    pub fn get_storage_stats(&self) -> BackupResult<StorageStats> {
        Ok(StorageStats::compute(&self.list_backups()?))
    }

    /// Metadata store shared with the recovery service
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Directory this backend archives
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed_uploads(dir: &Path) {
        std::fs::create_dir_all(dir.join("avatars")).unwrap();
        std::fs::write(dir.join("avatars/u42.png"), b"png bytes").unwrap();
        std::fs::write(dir.join("attachment.pdf"), b"%PDF-1.4").unwrap();
    }

    fn backend(root: &Path, key: Option<SymmetricKey>) -> FileBackupBackend {
        let uploads = root.join("uploads");
        seed_uploads(&uploads);
        let store = MetadataStore::open(root.join("meta")).unwrap();
        FileBackupBackend::new(uploads, store, root.join("backups"), key).unwrap()
    }

    #[tokio::test]
    async fn test_archive_backup_and_verify() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path(), Some(SymmetricKey::generate()));

        let meta = backend.create_full_backup(true).await.unwrap();
        assert_eq!(meta.status, BackupStatus::Completed);
        assert_eq!(meta.target, BackupTarget::Files);
        assert!(meta.file_path.to_string_lossy().ends_with(".tar.gz.enc"));
        assert!(backend.verify_backup(&meta.id).unwrap());

        // No unencrypted archive left behind
        let plain = dir
            .path()
            .join("backups")
            .join(format!("{}.tar.gz", meta.id));
        assert!(!plain.exists());
    }

    #[tokio::test]
    async fn test_unencrypted_archive_roundtrip() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path(), None);

        let meta = backend.create_full_backup(false).await.unwrap();

        let entries = FileBackupBackend::list_archive_entries(&meta.file_path).unwrap();
        let names: Vec<String> = entries
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.contains("avatars/u42.png")));
        assert!(names.iter().any(|n| n.contains("attachment.pdf")));

        let restore_dir = dir.path().join("restored");
        let count = FileBackupBackend::extract_archive(&meta.file_path, &restore_dir).unwrap();
        assert!(count >= 2);
        assert_eq!(
            std::fs::read(restore_dir.join("uploads/attachment.pdf")).unwrap(),
            b"%PDF-1.4"
        );
    }

    #[test]
    fn test_extract_skips_entries_escaping_destination() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("crafted.tar.gz");

        // Hand-built archive with one honest entry and one that tries to
        // climb out of the extraction directory
        let file = File::create(&archive).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, "uploads/good.txt", &b"good"[..])
            .unwrap();

        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o644);
        // `append_data` validates paths and refuses `..`, so write the raw
        // GNU name bytes directly to craft the escaping entry
        let name = b"../escape.txt";
        header.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name);
        header.set_cksum();
        builder.append(&header, &b"evil"[..]).unwrap();
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .unwrap();

        let dest = dir.path().join("restored");
        let count = FileBackupBackend::extract_archive(&archive, &dest).unwrap();

        assert_eq!(count, 1, "escaping entry must not count as restored");
        assert!(dest.join("uploads/good.txt").exists());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_source_dir_fails_with_failed_metadata() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("meta")).unwrap();
        let backend = FileBackupBackend::new(
            dir.path().join("does-not-exist"),
            store.clone(),
            dir.path().join("backups"),
            None,
        )
        .unwrap();

        let err = backend.create_full_backup(false).await;
        assert!(matches!(err, Err(BackupError::InvalidPath(_))));

        let records = store.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, BackupStatus::Failed);
    }
}
