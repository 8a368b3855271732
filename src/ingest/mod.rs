//! Ingestion module: one incremental run over every configured source
//!
//! This module contains the run pipeline, including:
//! - Loading checkpoints and fanning out one worker per source
//! - Matching headlines and resolving linked articles
//! - Persisting the archive, then the checkpoints

mod coordinator;
mod extract;
mod resolver;

pub use coordinator::{Coordinator, CoordinatorSettings, RunOutcome};
pub use extract::{extract_article, ExtractedArticle};
pub use resolver::{ContentResolver, HttpResolver, ResolvedContent};

use crate::config::Config;
use crate::output::{CheckpointState, RunReport};
use crate::state::CheckpointMap;
use crate::sources::{build_http_client, RedditCredentials, Source};
use crate::storage::{
    ArticleArchive, CheckpointLoad, CheckpointStore, JsonArticleArchive, JsonCheckpointStore,
};
use crate::SentryError;
use chrono::Utc;

/// Runs a complete ingestion pass against the configured files and endpoints
///
/// This is the main entry point. It will:
/// 1. Load the checkpoint document (unless `fresh`)
/// 2. Poll every source concurrently from its own cursor
/// 3. Append new matches to the archive
/// 4. Replace the checkpoint document with the merged cursors
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `fresh` - Ignore stored checkpoints and treat every source as a first run
///
/// # Returns
///
/// * `Ok(RunReport)` - Run completed and state was persisted
/// * `Err(SentryError)` - Setup or persistence failed
pub async fn run_once(config: &Config, fresh: bool) -> Result<RunReport, SentryError> {
    let client = build_http_client(&config.http)?;
    let credentials = RedditCredentials::from_env();
    let coordinator = Coordinator::from_config(config, client, credentials)?;

    let mut checkpoints = JsonCheckpointStore::new(&config.run.checkpoint_path);
    let mut archive = JsonArticleArchive::new(&config.run.archive_path);

    run_with(
        &coordinator,
        &config.sources,
        &mut checkpoints,
        &mut archive,
        fresh,
    )
    .await
}

/// Runs one pass with explicit collaborators
///
/// The archive is written before the checkpoints: if the checkpoint write
/// fails, the next run re-scans items that are already archived, and the
/// archive ignores them. Any persistence failure fails the run.
///
/// With `fresh`, every source is scanned as a first run, but a source that
/// fails keeps the cursor stored before the run.
pub async fn run_with(
    coordinator: &Coordinator,
    sources: &[Source],
    checkpoints: &mut dyn CheckpointStore,
    archive: &mut dyn ArticleArchive,
    fresh: bool,
) -> Result<RunReport, SentryError> {
    let started_at = Utc::now();

    let (checkpoint_state, prior) = if fresh {
        tracing::info!("Ignoring stored checkpoints (--fresh)");
        (CheckpointState::Ignored, CheckpointMap::new())
    } else {
        match checkpoints.load() {
            CheckpointLoad::Loaded(map) => (CheckpointState::Loaded, map),
            CheckpointLoad::Missing => (CheckpointState::Missing, CheckpointMap::new()),
            CheckpointLoad::Corrupt { .. } => (CheckpointState::Corrupt, CheckpointMap::new()),
        }
    };

    let mut outcome = coordinator.run(sources, &prior).await;
    if fresh && outcome.sources.iter().any(|s| s.is_failed()) {
        restore_failed_cursors(&mut outcome, &checkpoints.load().into_map());
    }

    let archived = archive.append(&outcome.matched)?;
    checkpoints.save(&outcome.checkpoints)?;

    let finished_at = Utc::now();
    tracing::info!(
        "Run completed: {} matches, {} newly archived, {} checkpoints saved in {}ms",
        outcome.matched.len(),
        archived,
        outcome.checkpoints.len(),
        (finished_at - started_at).num_milliseconds()
    );

    Ok(RunReport {
        started_at,
        finished_at,
        checkpoint_state,
        sources: outcome.sources,
        matched: outcome.matched,
        duplicates: outcome.duplicates,
        archived,
        checkpoints: outcome.checkpoints,
        checkpoint_location: checkpoints.location(),
    })
}

/// Puts back the stored cursor of every source that failed
fn restore_failed_cursors(outcome: &mut RunOutcome, stored: &CheckpointMap) {
    for report in outcome.sources.iter_mut().filter(|s| s.is_failed()) {
        if let Some(cursor) = stored.get(&report.source_id) {
            tracing::info!(
                "[{}] Failed during fresh run, keeping stored cursor {}",
                report.source_id,
                cursor
            );
            outcome
                .checkpoints
                .insert(report.source_id.clone(), cursor.clone());
            report.cursor = Some(cursor.clone());
        }
    }
}
