//! Output module for run summaries
//!
//! This module handles:
//! - Per-source and per-run counters
//! - Printing run summaries and stored checkpoints

mod report;

pub use report::{
    print_checkpoints, print_report, CheckpointState, RunReport, SourceReport, SourceStatus,
};
