//! OCR artifact files: write-once audit copies of raw OCR responses.
//!
//! Each successful OCR call produces exactly one file,
//! `ocr_<timestamp>_<random8>.json`, written before anything is derived
//! from the response. Files no work references are deleted by
//! [`ArtifactStore::reap`] once they are older than the retention TTL.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use inkstone_core::error::CoreError;
use inkstone_core::ocr::{artifact_file_name, is_artifact_file_name};
use inkstone_core::types::Timestamp;
use tokio::io::AsyncWriteExt;

/// How many fresh names to try before giving up on a collision.
const MAX_NAME_ATTEMPTS: usize = 3;

/// Counts from one reaping pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub scanned: usize,
    pub deleted: usize,
    pub referenced: usize,
}

/// Directory-backed store of OCR artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a raw OCR response body byte for byte and return the path
    /// written.
    ///
    /// The directory is created on demand. Files are opened with
    /// `create_new`, so an existing artifact is never overwritten.
    pub async fn write(&self, body: &[u8], now: Timestamp) -> Result<PathBuf, CoreError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CoreError::Internal(format!("Failed to create artifact directory: {e}"))
        })?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(artifact_file_name(now));
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(CoreError::Internal(format!(
                        "Failed to create artifact {}: {e}",
                        path.display()
                    )))
                }
            };
            file.write_all(body).await.map_err(|e| {
                CoreError::Internal(format!("Failed to write artifact {}: {e}", path.display()))
            })?;
            file.flush().await.map_err(|e| {
                CoreError::Internal(format!("Failed to flush artifact {}: {e}", path.display()))
            })?;
            return Ok(path);
        }

        Err(CoreError::Internal(
            "Could not find a free artifact file name".to_string(),
        ))
    }

    /// Validate a client-supplied artifact reference.
    ///
    /// Only the file name is trusted; it must follow the artifact naming
    /// pattern and exist in this store. Returns the canonical path string.
    pub async fn resolve_reference(&self, reference: &str) -> Result<String, CoreError> {
        let name = Path::new(reference)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| is_artifact_file_name(n))
            .ok_or_else(|| {
                CoreError::Validation(format!("'{reference}' is not an OCR artifact reference"))
            })?;

        let path = self.dir.join(name);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(path.to_string_lossy().into_owned()),
            _ => Err(CoreError::NotFoundByKey {
                entity: "OCR artifact",
                key: name.to_string(),
            }),
        }
    }

    /// Delete artifacts older than `ttl` whose file name is not in
    /// `referenced` (paths as stored on works).
    pub async fn reap(
        &self,
        ttl: Duration,
        referenced: &[String],
        now: SystemTime,
    ) -> Result<ReapReport, CoreError> {
        let keep: HashSet<&str> = referenced
            .iter()
            .filter_map(|r| Path::new(r).file_name().and_then(|n| n.to_str()))
            .collect();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ReapReport::default()),
            Err(e) => {
                return Err(CoreError::Internal(format!(
                    "Failed to read artifact directory: {e}"
                )))
            }
        };

        let mut report = ReapReport::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to read artifact directory: {e}")))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !is_artifact_file_name(name) {
                continue;
            }
            report.scanned += 1;

            if keep.contains(name) {
                report.referenced += 1;
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!(file = name, error = %e, "Cannot read artifact age, skipping");
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age < ttl {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    report.deleted += 1;
                    tracing::debug!(file = name, "Reaped OCR artifact");
                }
                Err(e) => tracing::warn!(file = name, error = %e, "Failed to delete artifact"),
            }
        }

        Ok(report)
    }
}
