//! Ingestion coordinator - per-run fan-out over sources
//!
//! This module runs one worker per configured source, concurrently:
//! - each worker fetches its source from its own prior cursor
//! - matches headlines and resolves linked articles
//! - hands back its matches, its new cursor and its counters
//!
//! Workers never touch shared state. The coordinator merges their results in
//! configured source order once every worker has finished.

use crate::config::{Config, ResolutionPolicy};
use crate::ingest::resolver::{ContentResolver, HttpResolver};
use crate::matcher::Matcher;
use crate::output::{SourceReport, SourceStatus};
use crate::sources::{
    FeedAdapter, FeedClient, HttpFeedClient, ListingAdapter, ListingClient, RedditClient,
    RedditCredentials, Source, SourceAdapter, SourceKind,
};
use crate::state::{CheckpointMap, Cursor};
use crate::storage::MatchedItem;
use crate::{SentryError, SourceError};
use chrono::Utc;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Knobs that apply to every worker of a run
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Newest posts requested per listing source
    pub page_size: u32,

    /// Time allowed to resolve one article
    pub resolve_timeout: Duration,

    /// Upper bound on one source's whole worker
    pub source_timeout: Option<Duration>,

    pub on_resolution_failure: ResolutionPolicy,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.listing.page_size,
            resolve_timeout: Duration::from_secs(config.http.resolve_timeout_secs),
            source_timeout: config.run.source_timeout_secs.map(Duration::from_secs),
            on_resolution_failure: config.run.on_resolution_failure,
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            resolve_timeout: Duration::from_secs(30),
            source_timeout: None,
            on_resolution_failure: ResolutionPolicy::Keep,
        }
    }
}

/// Everything a run produced, ready to persist
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Matched items, deduplicated by URL, first-seen wins
    pub matched: Vec<MatchedItem>,

    /// Prior checkpoints with every successful source's new cursor applied
    pub checkpoints: CheckpointMap,

    /// Per-source reports in configured order
    pub sources: Vec<SourceReport>,

    /// Matches dropped because an earlier source produced the same URL
    pub duplicates: usize,
}

/// Main ingestion coordinator structure
pub struct Coordinator {
    feed: FeedAdapter,
    listing: ListingAdapter,
    matcher: Arc<Matcher>,
    resolver: Arc<dyn ContentResolver>,
    settings: CoordinatorSettings,
}

impl Coordinator {
    /// Creates a coordinator from its collaborators
    ///
    /// Transports and resolver are injected so tests can run without network.
    pub fn new(
        feed_client: Arc<dyn FeedClient>,
        listing_client: Arc<dyn ListingClient>,
        resolver: Arc<dyn ContentResolver>,
        matcher: Matcher,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            feed: FeedAdapter::new(feed_client),
            listing: ListingAdapter::new(listing_client, settings.page_size),
            matcher: Arc::new(matcher),
            resolver,
            settings,
        }
    }

    /// Creates a coordinator wired to the HTTP transports
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `client` - Shared HTTP client
    /// * `credentials` - Listing credentials; `None` uses the public endpoints
    pub fn from_config(
        config: &Config,
        client: Client,
        credentials: Option<RedditCredentials>,
    ) -> Result<Self, SentryError> {
        let matcher = Matcher::from_config(&config.entities)?;
        tracing::info!(
            "Matching {} entities: {}",
            matcher.entity_count(),
            matcher.entity_names().collect::<Vec<_>>().join(", ")
        );

        let reddit = RedditClient::new(client.clone(), config.listing.clone(), credentials);
        if reddit.is_authenticated() {
            tracing::info!("Listing sources use authenticated access");
        }

        Ok(Self::new(
            Arc::new(HttpFeedClient::new(client.clone())),
            Arc::new(reddit),
            Arc::new(HttpResolver::new(client)),
            matcher,
            CoordinatorSettings::from_config(config),
        ))
    }

    fn adapter_for(&self, kind: SourceKind) -> SourceAdapter {
        match kind {
            SourceKind::Feed => SourceAdapter::Feed(self.feed.clone()),
            SourceKind::Listing => SourceAdapter::Listing(self.listing.clone()),
        }
    }

    /// Polls every source concurrently and merges the results
    ///
    /// Never fails as a whole: a failing source is reported and keeps its
    /// prior cursor, while the others proceed.
    pub async fn run(&self, sources: &[Source], prior: &CheckpointMap) -> RunOutcome {
        tracing::info!("Polling {} sources", sources.len());

        let mut workers = JoinSet::new();
        for (index, source) in sources.iter().enumerate() {
            let worker = SourceWorker {
                index,
                source: source.clone(),
                adapter: self.adapter_for(source.kind),
                prior: prior.get(&source.id).cloned(),
                matcher: Arc::clone(&self.matcher),
                resolver: Arc::clone(&self.resolver),
                settings: self.settings.clone(),
            };
            workers.spawn(worker.run());
        }

        let mut results = Vec::with_capacity(sources.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!("Source worker aborted: {}", e),
            }
        }

        merge_results(sources, prior, results)
    }
}

/// What a single worker hands back to the coordinator
#[derive(Debug)]
struct WorkerResult {
    index: usize,
    report: SourceReport,
    matched: Vec<MatchedItem>,
    cursor: Option<Cursor>,
}

struct SourceWorker {
    index: usize,
    source: Source,
    adapter: SourceAdapter,
    prior: Option<Cursor>,
    matcher: Arc<Matcher>,
    resolver: Arc<dyn ContentResolver>,
    settings: CoordinatorSettings,
}

impl SourceWorker {
    async fn run(self) -> WorkerResult {
        let processed = match self.settings.source_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.process()).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(limit)),
            },
            None => self.process().await,
        };

        match processed {
            Ok((report, matched, cursor)) => WorkerResult {
                index: self.index,
                report,
                matched,
                cursor,
            },
            Err(e) => {
                tracing::warn!(
                    "[{}] Source failed, keeping previous cursor: {}",
                    self.source.id,
                    e
                );
                WorkerResult {
                    index: self.index,
                    report: SourceReport::failed(
                        &self.source.id,
                        self.source.kind,
                        self.prior.clone(),
                        &e,
                    ),
                    matched: Vec::new(),
                    cursor: None,
                }
            }
        }
    }

    async fn process(
        &self,
    ) -> Result<(SourceReport, Vec<MatchedItem>, Option<Cursor>), SourceError> {
        let source = &self.source;
        let batch = self.adapter.fetch_since(source, self.prior.as_ref()).await?;

        let mut report = SourceReport {
            source_id: source.id.clone(),
            kind: source.kind,
            status: SourceStatus::Succeeded,
            fetched: batch.fetched,
            candidates: batch.candidates.len(),
            matched: 0,
            skipped: batch.skipped,
            resolution_failures: 0,
            dropped: 0,
            previous_cursor: self.prior.clone(),
            cursor: batch.cursor.clone().or_else(|| self.prior.clone()),
        };

        let mut matched = Vec::new();
        for candidate in batch.candidates {
            let Some(hit) = self.matcher.find(&candidate.title) else {
                continue;
            };
            report.matched += 1;
            tracing::info!(
                "[{}] {} matched \"{}\" ({})",
                source.id,
                hit.entity,
                candidate.title,
                hit.alias
            );

            let mut item = MatchedItem {
                url: candidate.url.clone(),
                title: candidate.title.clone(),
                content: candidate.body.clone().unwrap_or_default(),
                matched_entity: hit.entity,
                matched_alias: hit.alias,
                source_id: source.id.clone(),
                content_resolved: true,
                scraped_at: Utc::now(),
            };

            if candidate.linked {
                match self
                    .resolver
                    .resolve(&candidate.url, self.settings.resolve_timeout)
                    .await
                {
                    Ok(resolved) => {
                        if let Some(title) = resolved.title {
                            item.title = title;
                        }
                        item.content = resolved.body;
                        item.scraped_at = Utc::now();
                    }
                    Err(e) => {
                        report.resolution_failures += 1;
                        match self.settings.on_resolution_failure {
                            ResolutionPolicy::Keep => {
                                tracing::warn!("[{}] Keeping unresolved match: {}", source.id, e);
                                item.content_resolved = false;
                            }
                            ResolutionPolicy::Drop => {
                                tracing::warn!("[{}] Dropping unresolved match: {}", source.id, e);
                                report.dropped += 1;
                                continue;
                            }
                        }
                    }
                }
            }

            matched.push(item);
        }

        tracing::info!(
            "[{}] {} fetched, {} new, {} matched",
            source.id,
            report.fetched,
            report.candidates,
            report.matched
        );

        Ok((report, matched, batch.cursor))
    }
}

/// Merges worker results in configured source order
///
/// The checkpoint map starts as a copy of `prior`, so a source that failed,
/// panicked, or is no longer configured keeps its stored cursor.
fn merge_results(
    sources: &[Source],
    prior: &CheckpointMap,
    mut results: Vec<WorkerResult>,
) -> RunOutcome {
    results.sort_by_key(|r| r.index);

    let mut checkpoints = prior.clone();
    let mut seen = HashSet::new();
    let mut matched = Vec::new();
    let mut duplicates = 0;
    let mut reports = Vec::with_capacity(sources.len());
    let mut results = results.into_iter().peekable();

    for (index, source) in sources.iter().enumerate() {
        let Some(result) = results.next_if(|r| r.index == index) else {
            reports.push(SourceReport::failed(
                &source.id,
                source.kind,
                prior.get(&source.id).cloned(),
                "worker aborted",
            ));
            continue;
        };

        if let Some(cursor) = result.cursor {
            checkpoints.insert(source.id.clone(), cursor);
        }

        for item in result.matched {
            if seen.insert(item.url.clone()) {
                matched.push(item);
            } else {
                tracing::debug!("[{}] Duplicate of an earlier match: {}", source.id, item.url);
                duplicates += 1;
            }
        }

        reports.push(result.report);
    }

    RunOutcome {
        matched,
        checkpoints,
        sources: reports,
        duplicates,
    }
}
