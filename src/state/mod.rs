//! State module for tracking ingestion progress
//!
//! # Components
//!
//! - `Cursor`: a single source's progress marker (timestamp or item id)
//! - `CheckpointMap`: every source's cursor; the durable state between runs

mod cursor;

pub use cursor::{CheckpointMap, Cursor};
