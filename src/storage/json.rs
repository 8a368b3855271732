//! JSON file storage implementation
//!
//! Both stores keep one pretty-printed document on disk. Writes go to a
//! sibling temp file first and are renamed into place.

use crate::state::CheckpointMap;
use crate::storage::traits::{
    ArticleArchive, CheckpointLoad, CheckpointStore, StorageError, StorageResult,
};
use crate::storage::MatchedItem;
use serde::Serialize;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Checkpoint store backed by a JSON object `{source_id: cursor}`
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> CheckpointLoad {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    "No checkpoint file at {}, treating every source as a first run",
                    self.path.display()
                );
                return CheckpointLoad::Missing;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read checkpoint file {}: {}. Starting fresh",
                    self.path.display(),
                    e
                );
                return CheckpointLoad::Corrupt {
                    reason: e.to_string(),
                };
            }
        };

        match serde_json::from_str::<CheckpointMap>(&content) {
            Ok(map) => {
                tracing::info!(
                    "Loaded {} checkpoints from {}",
                    map.len(),
                    self.path.display()
                );
                CheckpointLoad::Loaded(map)
            }
            Err(e) => {
                tracing::warn!(
                    "Checkpoint file {} is corrupt: {}. Starting fresh",
                    self.path.display(),
                    e
                );
                CheckpointLoad::Corrupt {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn save(&mut self, checkpoints: &CheckpointMap) -> StorageResult<()> {
        write_json(&self.path, checkpoints)?;
        tracing::debug!(
            "Saved {} checkpoints to {}",
            checkpoints.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Article archive backed by a JSON array of [`MatchedItem`]
pub struct JsonArticleArchive {
    path: PathBuf,
}

impl JsonArticleArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StorageResult<Vec<MatchedItem>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| StorageError::CorruptArchive {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl ArticleArchive for JsonArticleArchive {
    fn contains(&self, url: &str) -> StorageResult<bool> {
        Ok(self.read()?.iter().any(|item| item.url == url))
    }

    fn append(&mut self, items: &[MatchedItem]) -> StorageResult<usize> {
        let mut archived = self.read()?;
        let mut known: HashSet<String> = archived.iter().map(|i| i.url.clone()).collect();

        let before = archived.len();
        for item in items {
            if known.insert(item.url.clone()) {
                archived.push(item.clone());
            } else {
                tracing::debug!("Article already archived: {}", item.url);
            }
        }

        let added = archived.len() - before;
        if added > 0 {
            write_json(&self.path, &archived)?;
            tracing::info!(
                "Archived {} new articles (total: {})",
                added,
                archived.len()
            );
        }

        Ok(added)
    }

    fn load_all(&self) -> StorageResult<Vec<MatchedItem>> {
        self.read()
    }
}

/// Serializes `value` and atomically replaces the file at `path`
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let mut data = serde_json::to_string_pretty(value)?;
    data.push('\n');

    let tmp = temp_path(path);
    std::fs::write(&tmp, data).map_err(|e| io_error(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_error(path, e))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}
