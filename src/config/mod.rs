//! Configuration module for Nifty-Sentry
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use nifty_sentry::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sentry.toml")).unwrap();
//! println!("Watching {} sources", config.sources.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, EntityEntry, HttpConfig, ListingConfig, ResolutionPolicy, RunConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
