//! End-to-end disaster-recovery scenarios
//!
//! Drives the public API the way the daemon does: create encrypted
//! backups of both targets, then restore them through the recovery
//! service with a stub database driver standing in for pg_dump/psql.

use async_trait::async_trait;
use caris_backup::database::{BackupOptions, DatabaseBackupBackend, DatabaseDriver, DumpMode};
use caris_backup::files::FileBackupBackend;
use caris_backup::metadata::MetadataStore;
use caris_backup::recovery::{FullRestoreOptions, RecoveryService, RestoreOptions};
use caris_backup::BackupResult;
use caris_crypto::SymmetricKey;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const DUMP_SQL: &str = "CREATE TABLE diary_entries (id SERIAL PRIMARY KEY, body TEXT);\n\
                        INSERT INTO diary_entries (body) VALUES ('first entry');\n";

/// Stand-in for the PostgreSQL tooling; records restores for assertions
struct StubDriver {
    fail_restore: AtomicBool,
    restored: Mutex<Vec<(PathBuf, String)>>,
}

impl StubDriver {
    fn new() -> Self {
        Self {
            fail_restore: AtomicBool::new(false),
            restored: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DatabaseDriver for StubDriver {
    async fn dump(&self, dest: &Path, _mode: DumpMode) -> BackupResult<()> {
        std::fs::write(dest, DUMP_SQL)?;
        Ok(())
    }

    async fn restore(&self, src: &Path, target_database: &str) -> BackupResult<()> {
        if self.fail_restore.load(Ordering::SeqCst) {
            return Err(caris_backup::BackupError::database(
                "psql exited with 2: connection refused",
            ));
        }
        let content = std::fs::read_to_string(src)?;
        self.restored
            .lock()
            .unwrap()
            .push((src.to_path_buf(), target_database.to_string()));
        assert_eq!(content, DUMP_SQL, "dump content survived the pipeline");
        Ok(())
    }
}

struct World {
    _dir: tempfile::TempDir,
    root: PathBuf,
    driver: Arc<StubDriver>,
    database: DatabaseBackupBackend,
    files: FileBackupBackend,
    recovery: RecoveryService,
}

impl World {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let store = MetadataStore::open(root.join("metadata")).unwrap();
        let key = SymmetricKey::generate();
        let driver = Arc::new(StubDriver::new());

        let uploads = root.join("uploads");
        std::fs::create_dir_all(uploads.join("avatars")).unwrap();
        std::fs::write(uploads.join("avatars/alice.png"), b"png-bytes").unwrap();
        std::fs::write(uploads.join("report.pdf"), b"pdf-bytes").unwrap();

        let database = DatabaseBackupBackend::new(
            driver.clone(),
            store.clone(),
            root.join("backups/database"),
            Some(key.clone()),
        )
        .unwrap();
        let files = FileBackupBackend::new(
            uploads,
            store.clone(),
            root.join("backups/files"),
            Some(key.clone()),
        )
        .unwrap();
        let recovery = RecoveryService::new(
            driver.clone(),
            store,
            Some(key),
            root.join("restore-tmp"),
            "postgresql://localhost/caris",
            root.join("restored"),
        );

        Self {
            _dir: dir,
            root,
            driver,
            database,
            files,
            recovery,
        }
    }
}

#[tokio::test]
async fn test_full_disaster_recovery_roundtrip() {
    let world = World::new();

    let db_meta = world
        .database
        .create_full_backup(BackupOptions::default())
        .await
        .unwrap();
    let file_meta = world.files.create_full_backup(true).await.unwrap();

    assert!(world.database.verify_backup(&db_meta.id).unwrap());
    assert!(world.files.verify_backup(&file_meta.id).unwrap());

    let result = world
        .recovery
        .restore_full(FullRestoreOptions {
            database_backup_id: db_meta.id.clone(),
            files_backup_id: Some(file_meta.id.clone()),
            verify: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
    // One database plus two archived files
    assert!(result.items_restored >= 3);

    let restored = world.driver.restored.lock().unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].1, "postgresql://localhost/caris");
    drop(restored);

    let avatar = world.root.join("restored/uploads/avatars/alice.png");
    assert_eq!(std::fs::read(avatar).unwrap(), b"png-bytes");
}

#[tokio::test]
async fn test_full_restore_is_partial_success_when_file_step_fails() {
    let world = World::new();

    let db_meta = world
        .database
        .create_full_backup(BackupOptions::default())
        .await
        .unwrap();
    let file_meta = world.files.create_full_backup(true).await.unwrap();

    // Corrupt the file archive; the database side stays healthy
    std::fs::write(&file_meta.file_path, b"tampered").unwrap();

    let result = world
        .recovery
        .restore_full(FullRestoreOptions {
            database_backup_id: db_meta.id.clone(),
            files_backup_id: Some(file_meta.id.clone()),
            verify: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(result.success, "database restored, so overall success");
    assert!(result.errors.is_empty());
    assert!(!result.warnings.is_empty());
    assert!(result.warnings[0].contains(&file_meta.id));
    assert_eq!(world.driver.restored.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_full_restore_fails_hard_when_database_step_fails() {
    let world = World::new();

    let db_meta = world
        .database
        .create_full_backup(BackupOptions::default())
        .await
        .unwrap();
    world.files.create_full_backup(true).await.unwrap();
    world.driver.fail_restore.store(true, Ordering::SeqCst);

    let result = world
        .recovery
        .restore_full(FullRestoreOptions {
            database_backup_id: db_meta.id,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.errors[0].contains("psql"));
}

#[tokio::test]
async fn test_full_restore_without_file_backup_warns() {
    let world = World::new();

    let db_meta = world
        .database
        .create_full_backup(BackupOptions::default())
        .await
        .unwrap();

    let result = world
        .recovery
        .restore_full(FullRestoreOptions {
            database_backup_id: db_meta.id,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(result.success);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("files were not restored")));
}

#[tokio::test]
async fn test_dry_run_full_restore_touches_nothing() {
    let world = World::new();

    let db_meta = world
        .database
        .create_full_backup(BackupOptions::default())
        .await
        .unwrap();
    let file_meta = world.files.create_full_backup(true).await.unwrap();

    let result = world
        .recovery
        .restore_full(FullRestoreOptions {
            database_backup_id: db_meta.id,
            files_backup_id: Some(file_meta.id),
            dry_run: true,
            verify: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.dry_run);
    assert!(world.driver.restored.lock().unwrap().is_empty());
    assert!(!world.root.join("restored").exists());
}

#[tokio::test]
async fn test_restore_into_alternate_targets() {
    let world = World::new();

    let db_meta = world
        .database
        .create_full_backup(BackupOptions::default())
        .await
        .unwrap();
    let file_meta = world.files.create_full_backup(true).await.unwrap();

    world
        .recovery
        .restore_database(RestoreOptions {
            backup_id: db_meta.id,
            target_database: Some("postgresql://localhost/caris_staging".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(
        world.driver.restored.lock().unwrap()[0].1,
        "postgresql://localhost/caris_staging"
    );

    let alt = world.root.join("staging-files");
    let result = world
        .recovery
        .restore_files(RestoreOptions {
            backup_id: file_meta.id,
            target_dir: Some(alt.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(result.success);
    assert!(alt.join("uploads/report.pdf").exists());
}
