//! Utility functions shared by the backup pipelines
//!
//! Compression helpers, directory validation and artifact stage handling.

use crate::error::{BackupError, BackupResult};
use flate2::read::GzDecoder;
use flate2::{write::GzEncoder, Compression};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Utility functions for backup operations
pub struct BackupUtils;

impl BackupUtils {
    /// Validate and create a backup directory if needed
    pub fn validate_backup_dir(path: &Path) -> BackupResult<()> {
        if !path.exists() {
            info!("📂 Creating backup directory at {:?}", path);
            fs::create_dir_all(path)?;
        } else if !path.is_dir() {
            return Err(BackupError::InvalidPath(path.to_path_buf()));
        }

        // Check write permissions
        let test_file = path.join(".permission_test");
        fs::write(&test_file, "test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Gzip-compress a file at maximum ratio
    pub fn compress_file(src_path: &Path, dest_path: &Path) -> BackupResult<()> {
        info!("🗜 Compressing {:?} to {:?}", src_path, dest_path);

        let src_file = fs::File::open(src_path)?;
        let dest_file = fs::File::create(dest_path)?;

        let mut encoder = GzEncoder::new(dest_file, Compression::best());
        let mut reader = std::io::BufReader::new(src_file);
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            encoder.write_all(&buffer[..bytes_read])?;
        }

        encoder
            .finish()
            .map_err(|e| BackupError::Compression(e.to_string()))?;
        Ok(())
    }

    /// Decompress a gzip file
    pub fn decompress_file(src_path: &Path, dest_path: &Path) -> BackupResult<()> {
        info!("🗜 Decompressing {:?} to {:?}", src_path, dest_path);

        let src_file = fs::File::open(src_path)?;
        let dest_file = fs::File::create(dest_path)?;

        let mut decoder = GzDecoder::new(src_file);
        let mut writer = std::io::BufWriter::new(dest_file);
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = decoder
                .read(&mut buffer)
                .map_err(|e| BackupError::Compression(e.to_string()))?;
            if bytes_read == 0 {
                break;
            }
            writer.write_all(&buffer[..bytes_read])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Remove a consumed pipeline stage file
    ///
    /// Each pipeline stage deletes its input so no uncompressed or
    /// unencrypted intermediate survives on disk.
    pub fn remove_stage_file(path: &Path) -> BackupResult<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    /// Best-effort removal of in-flight stage files after a failed stage
    ///
    /// Missing files are expected here; anything else is logged and
    /// swallowed so the original stage error propagates unchanged.
    pub fn discard_stage_files(paths: &[&Path]) {
        for path in paths {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to discard stage file {:?}: {}", path, e);
                }
            }
        }
    }

    /// Size and checksum of a finished artifact
    pub fn artifact_size_and_checksum(artifact: &Path) -> BackupResult<(u64, String)> {
        let size = fs::metadata(artifact)?.len();
        let checksum = caris_crypto::checksum_file(artifact)?;
        Ok((size, checksum))
    }

    /// Human-readable byte size for log lines and notifications
    pub fn format_size(bytes: u64) -> String {
        const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
        let mut value = bytes as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} B", bytes)
        } else {
            format!("{:.1} {}", value, UNITS[unit])
        }
    }
}
