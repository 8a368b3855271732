//! Nifty-Sentry: incremental market news watcher
//!
//! This crate polls syndication feeds and forum listings for headlines that mention
//! a fixed set of companies, resolves the linked articles, and keeps per-source
//! checkpoints so every run picks up exactly where the previous one stopped.

pub mod config;
pub mod ingest;
pub mod matcher;
pub mod output;
pub mod sources;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Nifty-Sentry operations
#[derive(Debug, Error)]
pub enum SentryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid keyword pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Failure to fetch or decode a whole source
///
/// A source error aborts only the worker polling that source; its cursor is
/// carried forward unchanged.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Source timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Failure to resolve a matched item's target page into article text
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Timed out resolving {url}")]
    Timeout { url: String },

    #[error("No readable content at {url}")]
    Empty { url: String },
}

/// Result type alias for Nifty-Sentry operations
pub type Result<T> = std::result::Result<T, SentryError>;

// Re-export commonly used types
pub use config::Config;
pub use ingest::{run_once, Coordinator};
pub use matcher::{EntityMatch, Matcher};
pub use sources::{CandidateItem, Source, SourceKind};
pub use state::{CheckpointMap, Cursor};
pub use storage::MatchedItem;
