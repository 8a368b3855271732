//! Storage traits and error types
//!
//! This module defines the trait interfaces for the two durable stores and the
//! error type shared by their implementations.

use crate::state::CheckpointMap;
use crate::storage::MatchedItem;
use thiserror::Error;

/// Errors that can occur while persisting state
///
/// Any of these is terminal for a run: reporting success after a failed write
/// would let the next run re-scan or skip items.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive at {path} is corrupt and will not be overwritten: {reason}")]
    CorruptArchive { path: String, reason: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of reading the checkpoint document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointLoad {
    /// A valid document was read
    Loaded(CheckpointMap),

    /// No document exists yet; every source starts as a first run
    Missing,

    /// The document exists but could not be read or decoded
    Corrupt { reason: String },
}

impl CheckpointLoad {
    /// Returns the loaded map, or an empty one for missing/corrupt state
    pub fn into_map(self) -> CheckpointMap {
        match self {
            Self::Loaded(map) => map,
            Self::Missing | Self::Corrupt { .. } => CheckpointMap::new(),
        }
    }
}

/// Durable mapping from source id to cursor
///
/// Loaded once at process start and written once at process end.
pub trait CheckpointStore: Send {
    /// Reads the stored checkpoints; never fails, see [`CheckpointLoad`]
    fn load(&self) -> CheckpointLoad;

    /// Replaces the stored checkpoints with `checkpoints`
    ///
    /// The in-memory map is authoritative: nothing on disk is merged in.
    fn save(&mut self, checkpoints: &CheckpointMap) -> StorageResult<()>;

    /// Where the checkpoints live, for reporting
    fn location(&self) -> String;
}

/// Append-only collection of matched articles keyed by URL
pub trait ArticleArchive: Send {
    /// Checks whether an article with this URL is already archived
    fn contains(&self, url: &str) -> StorageResult<bool>;

    /// Appends items whose URL is not yet archived
    ///
    /// Returns the number of items actually added. Re-appending an archived URL
    /// leaves the stored entry untouched.
    fn append(&mut self, items: &[MatchedItem]) -> StorageResult<usize>;

    /// Returns every archived item in insertion order
    fn load_all(&self) -> StorageResult<Vec<MatchedItem>>;
}
