// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Dead Letter Sink: durable record of failures whose redeliveries ran out.
//!
//! Entries are append-only. The engine writes them and never rewrites,
//! deletes or replays them; reprocessing is a manual job.
//!
//! # File layout
//!
//! ```text
//! {errorDirectory}/
//! ├── error-20260301-020000-0190a1b2-....json
//! └── error-20260301-050000-0190a1c9-....json
//! ```
//!
//! Each file holds one pretty-printed [`DeadLetterEntry`]. The UUID v7
//! suffix keeps names unique when two entries land in the same second.

use crate::classifier::ErrorEvent;
use crate::error::{IntegrationError, Result};
use crate::transport::BoxFuture;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Immutable snapshot of a terminal failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    /// The body that could not be delivered, or `null` if nothing was fetched.
    pub payload: Value,
    pub error: ErrorEvent,
}

impl DeadLetterEntry {
    pub fn new(payload: Value, error: ErrorEvent) -> Self {
        Self {
            id: Uuid::now_v7(),
            recorded_at: Utc::now(),
            payload,
            error,
        }
    }

    /// File name for this entry.
    pub fn file_name(&self) -> String {
        format!(
            "error-{}-{}.json",
            self.recorded_at.format("%Y%m%d-%H%M%S"),
            self.id
        )
    }
}

/// Append-only store for dead letters.
pub trait DeadLetterSink: Send + Sync + 'static {
    /// Persist one entry.
    fn append(&self, entry: DeadLetterEntry) -> BoxFuture<'_, ()>;

    /// Every stored entry, oldest first.
    fn list(&self) -> BoxFuture<'_, Vec<DeadLetterEntry>>;
}

/// Dead letters as JSON files in a directory.
#[derive(Debug, Clone)]
pub struct FileDeadLetterSink {
    directory: PathBuf,
}

impl FileDeadLetterSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn write_entry(&self, entry: &DeadLetterEntry) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| IntegrationError::DeadLetter {
                path: self.directory.clone(),
                source,
            })?;

        let path = self.directory.join(entry.file_name());
        let body = serde_json::to_vec_pretty(entry)?;

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| IntegrationError::DeadLetter {
                path: path.clone(),
                source,
            })?;
        fill(file, &path, &body).await?;
        Ok(path)
    }

    async fn read_all(&self) -> Result<Vec<DeadLetterEntry>> {
        let mut dir = match tokio::fs::read_dir(&self.directory).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(IntegrationError::DeadLetter {
                    path: self.directory.clone(),
                    source,
                })
            }
        };

        let mut paths = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|source| IntegrationError::DeadLetter {
                path: self.directory.clone(),
                source,
            })?
        {
            let path = item.path();
            let is_entry = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("error-") && n.ends_with(".json"))
                .unwrap_or(false);
            if is_entry {
                paths.push(path);
            }
        }

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| IntegrationError::DeadLetter {
                    path: path.clone(),
                    source,
                })?;
            match serde_json::from_slice::<DeadLetterEntry>(&bytes) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable dead-letter file"),
            }
        }
        entries.sort_by_key(|e| (e.recorded_at, e.id));
        Ok(entries)
    }
}

impl DeadLetterSink for FileDeadLetterSink {
    fn append(&self, entry: DeadLetterEntry) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let path = self.write_entry(&entry).await?;
            crate::metrics::record_dead_letter(entry.error.entity);
            info!(
                path = %path.display(),
                job_id = %entry.error.job_id,
                entity = %entry.error.entity,
                "Dead letter written"
            );
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, Vec<DeadLetterEntry>> {
        Box::pin(async move {
            let entries = self.read_all().await?;
            debug!(count = entries.len(), "Listed dead letters");
            Ok(entries)
        })
    }
}

/// Write `body` into the freshly created `file` at `path`. A file that could
/// not be fully written is removed so no truncated entry is left behind.
async fn fill(mut file: tokio::fs::File, path: &Path, body: &[u8]) -> Result<()> {
    let written = match file.write_all(body).await {
        Ok(()) => file.sync_all().await,
        Err(e) => Err(e),
    };
    let Err(source) = written else {
        return Ok(());
    };
    drop(file);
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Could not remove partial dead letter");
    }
    Err(IntegrationError::DeadLetter {
        path: path.to_path_buf(),
        source,
    })
}
