//! Per-source progress markers
//!
//! A cursor decides what "new since last run" means for one source. Cursors of
//! different sources are never compared with each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque progress marker for a single source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    /// Feed sources: entries published strictly after this instant are new
    Timestamp(DateTime<Utc>),

    /// Listing sources: posts ahead of this id (newest-first) are new
    ItemId(String),
}

impl Cursor {
    /// Returns the timestamp if this is a feed cursor
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::ItemId(_) => None,
        }
    }

    /// Returns the item id if this is a listing cursor
    pub fn as_item_id(&self) -> Option<&str> {
        match self {
            Self::Timestamp(_) => None,
            Self::ItemId(id) => Some(id),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::ItemId(id) => write!(f, "#{}", id),
        }
    }
}

/// Mapping from source id to cursor; the whole durable state between runs
///
/// Keys are kept sorted so the persisted document diffs cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointMap(BTreeMap<String, Cursor>);

impl CheckpointMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_id: &str) -> Option<&Cursor> {
        self.0.get(source_id)
    }

    /// Sets a source's cursor, returning the previous value
    pub fn insert(&mut self, source_id: impl Into<String>, cursor: Cursor) -> Option<Cursor> {
        self.0.insert(source_id.into(), cursor)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cursor)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
