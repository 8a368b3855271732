//! Storage module for persisting run state
//!
//! This module handles the two durable documents kept between runs:
//! - the checkpoint document (source id → cursor)
//! - the article archive (matched items keyed by URL)

mod json;
mod traits;

pub use json::{JsonArticleArchive, JsonCheckpointStore};
pub use traits::{ArticleArchive, CheckpointLoad, CheckpointStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A headline that passed the matcher, enriched with article content
///
/// Archived exactly once per distinct URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedItem {
    /// Article URL; the archive key
    pub url: String,

    /// Resolved article title, or the headline when resolution was skipped
    pub title: String,

    /// Article text (resolved body, post text, or feed description)
    pub content: String,

    /// Canonical entity the headline matched
    #[serde(default)]
    pub matched_entity: String,

    /// Alias that produced the match
    #[serde(default)]
    pub matched_alias: String,

    /// Source the item was first seen on
    #[serde(default)]
    pub source_id: String,

    /// False when the linked article could not be resolved
    #[serde(default = "resolved_by_default")]
    pub content_resolved: bool,

    pub scraped_at: DateTime<Utc>,
}

fn resolved_by_default() -> bool {
    true
}
