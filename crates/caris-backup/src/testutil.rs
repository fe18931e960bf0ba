//! Test doubles shared by the unit tests

use crate::database::{DatabaseDriver, DumpMode};
use crate::error::{BackupError, BackupResult};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fake driver writing a canned dump, or failing on demand
pub(crate) struct FakeDriver {
    pub dump_content: Vec<u8>,
    pub fail_dump: bool,
    /// Report success without writing the dump file
    pub vanish_dump: bool,
    pub fail_restore: bool,
    pub restore_calls: AtomicUsize,
}

impl FakeDriver {
    pub(crate) fn new() -> Self {
        Self {
            dump_content: b"CREATE TABLE diary_entries (id SERIAL PRIMARY KEY);\n".to_vec(),
            fail_dump: false,
            vanish_dump: false,
            fail_restore: false,
            restore_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DatabaseDriver for FakeDriver {
    async fn dump(&self, dest: &Path, _mode: DumpMode) -> BackupResult<()> {
        if self.fail_dump {
            return Err(BackupError::database("pg_dump exited with 1: boom"));
        }
        if self.vanish_dump {
            return Ok(());
        }
        std::fs::write(dest, &self.dump_content)?;
        Ok(())
    }

    async fn restore(&self, src: &Path, _target: &str) -> BackupResult<()> {
        self.restore_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_restore {
            return Err(BackupError::database("psql exited with 1: restore boom"));
        }
        // A restore still reads the dump it is handed
        std::fs::read(src)?;
        Ok(())
    }
}
