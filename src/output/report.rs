//! Run reports
//!
//! This module collects what happened during a run (per source and overall)
//! and prints it to stdout once the run is over.

use crate::sources::SourceKind;
use crate::state::{CheckpointMap, Cursor};
use crate::storage::MatchedItem;
use chrono::{DateTime, Utc};

/// How a source's worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Succeeded,
    /// Fetch or decode failed; the prior cursor was kept
    Failed { error: String },
}

/// Per-source counters for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source_id: String,
    pub kind: SourceKind,
    pub status: SourceStatus,

    /// Entries returned by the transport
    pub fetched: usize,

    /// Entries that passed the freshness test
    pub candidates: usize,

    /// Candidates whose headline matched an entity
    pub matched: usize,

    /// Entries skipped for unreadable data
    pub skipped: usize,

    /// Matches whose linked article could not be resolved
    pub resolution_failures: usize,

    /// Matches discarded because of a resolution failure
    pub dropped: usize,

    pub previous_cursor: Option<Cursor>,
    pub cursor: Option<Cursor>,
}

impl SourceReport {
    /// Report for a source whose worker did not produce a batch
    pub fn failed(
        source_id: &str,
        kind: SourceKind,
        previous_cursor: Option<Cursor>,
        error: impl ToString,
    ) -> Self {
        Self {
            source_id: source_id.to_string(),
            kind,
            status: SourceStatus::Failed {
                error: error.to_string(),
            },
            fetched: 0,
            candidates: 0,
            matched: 0,
            skipped: 0,
            resolution_failures: 0,
            dropped: 0,
            cursor: previous_cursor.clone(),
            previous_cursor,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, SourceStatus::Failed { .. })
    }
}

/// How the checkpoint document looked at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    Loaded,
    Missing,
    Corrupt,
    /// Ignored on request (`--fresh`)
    Ignored,
}

impl CheckpointState {
    fn describe(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Missing => "missing (first run)",
            Self::Corrupt => "corrupt (starting fresh)",
            Self::Ignored => "ignored (--fresh)",
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub checkpoint_state: CheckpointState,

    /// Per-source outcomes in configured order
    pub sources: Vec<SourceReport>,

    /// Matched items after cross-source dedup, in emission order
    pub matched: Vec<MatchedItem>,

    /// Matches dropped as duplicates of an earlier source's item
    pub duplicates: usize,

    /// Items newly written to the archive
    pub archived: usize,

    /// Checkpoints written at the end of the run
    pub checkpoints: CheckpointMap,

    /// Where the checkpoints were written
    pub checkpoint_location: String,
}

impl RunReport {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.is_failed()).count()
    }

    /// Sources whose cursor moved during this run
    pub fn advanced_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| !s.is_failed() && s.cursor != s.previous_cursor)
            .count()
    }

    /// One-line confirmation that the checkpoint document was replaced
    pub fn persistence_summary(&self) -> String {
        format!(
            "Checkpoints saved: {} ({} advanced) to {}",
            self.checkpoints.len(),
            self.advanced_sources(),
            self.checkpoint_location
        )
    }
}

/// Prints a run report to stdout in a formatted manner
pub fn print_report(report: &RunReport) {
    let elapsed = report.finished_at - report.started_at;

    println!("=== Run Summary ===\n");

    println!("Overview:");
    println!("  Started: {}", report.started_at.to_rfc3339());
    println!(
        "  Duration: {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    println!("  Checkpoints: {}", report.checkpoint_state.describe());
    println!(
        "  Sources: {} ({} failed)",
        report.sources.len(),
        report.failed_sources()
    );
    println!("  Matched items: {}", report.matched.len());
    println!("  Cross-source duplicates: {}", report.duplicates);
    println!("  Newly archived: {}", report.archived);
    println!("  {}", report.persistence_summary());
    println!();

    println!("Sources:");
    for source in &report.sources {
        match &source.status {
            SourceStatus::Succeeded => println!(
                "  {} [{}]: {} fetched, {} new, {} matched, {} skipped, {} unresolved, {} dropped",
                source.source_id,
                source.kind,
                source.fetched,
                source.candidates,
                source.matched,
                source.skipped,
                source.resolution_failures,
                source.dropped
            ),
            SourceStatus::Failed { error } => {
                println!("  {} [{}]: FAILED ({})", source.source_id, source.kind, error)
            }
        }
    }
    println!();

    if report.matched.is_empty() {
        println!("No new matching items found.");
        return;
    }

    println!("Matched Items:");
    for item in &report.matched {
        let note = if item.content_resolved {
            ""
        } else {
            " (content unavailable)"
        };
        println!(
            "  [{}] {} (via {}){}",
            item.matched_entity, item.title, item.source_id, note
        );
        println!("      {}", item.url);
    }
}

/// Prints the stored checkpoints, one source per line
pub fn print_checkpoints(checkpoints: &CheckpointMap) {
    println!("=== Checkpoints ===\n");

    if checkpoints.is_empty() {
        println!("No checkpoints recorded.");
        return;
    }

    for (source_id, cursor) in checkpoints.iter() {
        match cursor {
            Cursor::Timestamp(_) => println!("  {}: scanned until {}", source_id, cursor),
            Cursor::ItemId(_) => println!("  {}: newest seen {}", source_id, cursor),
        }
    }
}
