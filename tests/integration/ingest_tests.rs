//! Integration tests for the ingestion pipeline
//!
//! These tests use wiremock to stand in for the feed host, the listing API and
//! the article sites, and run full passes against JSON state in a temp dir.

use nifty_sentry::config::{parse_config, Config};
use nifty_sentry::ingest::{run_with, Coordinator};
use nifty_sentry::output::CheckpointState;
use nifty_sentry::sources::build_http_client;
use nifty_sentry::state::{CheckpointMap, Cursor};
use nifty_sentry::storage::{
    ArticleArchive, CheckpointStore, JsonArticleArchive, JsonCheckpointStore,
};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a config pointing every source at the mock server
fn create_test_config(base_url: &str, dir: &Path, sources: &str) -> Config {
    let toml = format!(
        r#"
[run]
checkpoint-path = "{checkpoints}"
archive-path = "{archive}"

[http]
user-agent = "SentryTest/1.0"
request-timeout-secs = 5
resolve-timeout-secs = 5

[listing]
base-url = "{base_url}"
page-size = 25

{sources}
"#,
        checkpoints = dir.join("checkpoints.json").display(),
        archive = dir.join("articles.json").display(),
        base_url = base_url,
        sources = sources,
    );
    parse_config(&toml).expect("Failed to parse test config")
}

fn coordinator(config: &Config) -> Coordinator {
    let client = build_http_client(&config.http).expect("Failed to build client");
    Coordinator::from_config(config, client, None).expect("Failed to build coordinator")
}

async fn run(config: &Config) -> nifty_sentry::Result<nifty_sentry::output::RunReport> {
    let mut checkpoints = JsonCheckpointStore::new(&config.run.checkpoint_path);
    let mut archive = JsonArticleArchive::new(&config.run.archive_path);
    run_with(
        &coordinator(config),
        &config.sources,
        &mut checkpoints,
        &mut archive,
        false,
    )
    .await
}

fn seed_checkpoints(config: &Config, entries: &[(&str, Cursor)]) {
    let mut map = CheckpointMap::new();
    for (id, cursor) in entries {
        map.insert(*id, cursor.clone());
    }
    JsonCheckpointStore::new(&config.run.checkpoint_path)
        .save(&map)
        .expect("Failed to seed checkpoints");
}

fn stored_checkpoints(config: &Config) -> CheckpointMap {
    JsonCheckpointStore::new(&config.run.checkpoint_path)
        .load()
        .into_map()
}

fn old_feed_cursor() -> Cursor {
    Cursor::Timestamp("2024-01-01T00:00:00Z".parse().unwrap())
}

fn rss(items: &[(&str, &str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link, date)| {
            format!(
                "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate>\
                 <description>Summary of {}</description></item>",
                title, link, date, title
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Markets</title>{}</channel></rss>"#,
        body
    )
}

fn article(title: &str, text: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body><nav><p>Menu</p></nav>\
         <article><p>{}</p></article></body></html>",
        title, text
    )
}

async fn mount_get(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_run_then_nothing_new() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_get(
        &server,
        "/rss.xml",
        ResponseTemplate::new(200).set_body_string(rss(&[
            (
                "Reliance Q4 profit rises",
                &format!("{}/articles/ril", base),
                "Wed, 01 May 2024 10:00:00 +0530",
            ),
            (
                "Rupee closes flat",
                &format!("{}/articles/rupee", base),
                "Wed, 01 May 2024 09:00:00 GMT",
            ),
        ])),
    )
    .await;

    let listing = json!({
        "kind": "Listing",
        "data": { "children": [
            { "kind": "t3", "data": {
                "id": "p2", "title": "TCS wins $2bn deal",
                "url": format!("{}/articles/tcs", base),
                "permalink": "/r/stocks/comments/p2/tcs/",
                "is_self": false, "selftext": "", "created_utc": 1714557600.0
            }},
            { "kind": "t3", "data": {
                "id": "p1", "title": "Thoughts on ITC?",
                "url": format!("{}/r/stocks/comments/p1/itc/", base),
                "permalink": "/r/stocks/comments/p1/itc/",
                "is_self": true, "selftext": "Holding since 2020", "created_utc": 1714550000.0
            }}
        ]}
    });
    mount_get(
        &server,
        "/r/stocks/new.json",
        ResponseTemplate::new(200).set_body_json(listing),
    )
    .await;

    mount_get(
        &server,
        "/articles/ril",
        ResponseTemplate::new(200).set_body_string(article(
            "Reliance beats estimates",
            "Refining margins improved.",
        )),
    )
    .await;
    mount_get(
        &server,
        "/articles/tcs",
        ResponseTemplate::new(200)
            .set_body_string(article("TCS signs deal", "The contract runs five years.")),
    )
    .await;

    let config = create_test_config(
        &base,
        dir.path(),
        &format!(
            r#"
[[source]]
id = "markets"
kind = "feed"
endpoint = "{}/rss.xml"

[[source]]
id = "r-stocks"
kind = "listing"
endpoint = "stocks"
"#,
            base
        ),
    );
    seed_checkpoints(&config, &[("markets", old_feed_cursor())]);

    let report = run(&config).await.expect("First run failed");
    assert_eq!(report.checkpoint_state, CheckpointState::Loaded);
    assert_eq!(report.failed_sources(), 0);
    assert_eq!(report.archived, 3);

    let archived = JsonArticleArchive::new(&config.run.archive_path)
        .load_all()
        .unwrap();
    let entities: Vec<&str> = archived.iter().map(|i| i.matched_entity.as_str()).collect();
    assert_eq!(entities, vec!["Reliance", "TCS", "ITC"]);

    assert_eq!(archived[0].title, "Reliance beats estimates");
    assert_eq!(archived[0].content, "Refining margins improved.");
    assert_eq!(archived[1].content, "The contract runs five years.");
    assert_eq!(archived[2].content, "Holding since 2020");
    assert_eq!(
        archived[2].url,
        format!("{}/r/stocks/comments/p1/itc/", base)
    );
    assert!(archived.iter().all(|i| i.content_resolved));

    let checkpoints = stored_checkpoints(&config);
    assert_eq!(
        checkpoints.get("r-stocks"),
        Some(&Cursor::ItemId("p2".into()))
    );
    let feed_cursor = checkpoints
        .get("markets")
        .and_then(|c| c.as_timestamp())
        .unwrap();
    assert!(feed_cursor > old_feed_cursor().as_timestamp().unwrap());

    // Same upstream content: every source is caught up
    let second = run(&config).await.expect("Second run failed");
    assert!(second.matched.is_empty());
    assert_eq!(second.archived, 0);
    assert_eq!(
        JsonArticleArchive::new(&config.run.archive_path)
            .load_all()
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_failing_source_keeps_its_cursor() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_get(&server, "/down.xml", ResponseTemplate::new(500)).await;
    mount_get(
        &server,
        "/r/stocks/new.json",
        ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": { "children": [
                { "kind": "t3", "data": {
                    "id": "p5", "title": "Infosys buyback", "is_self": true,
                    "permalink": "/r/stocks/comments/p5/infy/", "selftext": "Details inside",
                    "created_utc": 1714557600.0
                }},
                { "kind": "t3", "data": {
                    "id": "p4", "title": "Old news", "is_self": true,
                    "permalink": "/r/stocks/comments/p4/old/", "created_utc": 1714550000.0
                }}
            ]}
        })),
    )
    .await;

    let config = create_test_config(
        &base,
        dir.path(),
        &format!(
            r#"
[[source]]
id = "down"
kind = "feed"
endpoint = "{}/down.xml"

[[source]]
id = "r-stocks"
kind = "listing"
endpoint = "stocks"
"#,
            base
        ),
    );
    seed_checkpoints(
        &config,
        &[
            ("down", old_feed_cursor()),
            ("r-stocks", Cursor::ItemId("p4".into())),
        ],
    );

    let report = run(&config).await.expect("Run should succeed despite one failing source");
    assert_eq!(report.failed_sources(), 1);
    assert!(report.sources[0].is_failed());
    assert_eq!(report.matched.len(), 1);
    assert_eq!(report.matched[0].matched_entity, "Infosys");

    let checkpoints = stored_checkpoints(&config);
    assert_eq!(checkpoints.get("down"), Some(&old_feed_cursor()));
    assert_eq!(
        checkpoints.get("r-stocks"),
        Some(&Cursor::ItemId("p5".into()))
    );
}

#[tokio::test]
async fn test_same_article_from_two_sources_is_archived_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let shared = format!("{}/articles/hdfc", base);

    for (community, id) in [("stocks", "a1"), ("investing", "b1")] {
        mount_get(
            &server,
            &format!("/r/{}/new.json", community),
            ResponseTemplate::new(200).set_body_json(json!({
                "kind": "Listing",
                "data": { "children": [
                    { "kind": "t3", "data": {
                        "id": id, "title": "HDFC Bank completes merger", "url": &shared,
                        "permalink": format!("/r/{}/comments/{}/hdfc/", community, id),
                        "is_self": false, "created_utc": 1714557600.0
                    }}
                ]}
            })),
        )
        .await;
    }
    mount_get(
        &server,
        "/articles/hdfc",
        ResponseTemplate::new(200).set_body_string(article("HDFC merger", "Merger is complete.")),
    )
    .await;

    let config = create_test_config(
        &base,
        dir.path(),
        r#"
[[source]]
id = "r-stocks"
kind = "listing"
endpoint = "stocks"

[[source]]
id = "r-investing"
kind = "listing"
endpoint = "investing"
"#,
    );

    let report = run(&config).await.expect("Run failed");
    assert_eq!(report.matched.len(), 1);
    assert_eq!(report.matched[0].source_id, "r-stocks");
    assert_eq!(report.duplicates, 1);

    let archived = JsonArticleArchive::new(&config.run.archive_path)
        .load_all()
        .unwrap();
    assert_eq!(archived.len(), 1);

    let checkpoints = stored_checkpoints(&config);
    assert_eq!(checkpoints.get("r-stocks"), Some(&Cursor::ItemId("a1".into())));
    assert_eq!(
        checkpoints.get("r-investing"),
        Some(&Cursor::ItemId("b1".into()))
    );
}

#[tokio::test]
async fn test_unresolvable_article_keeps_feed_summary() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_get(
        &server,
        "/rss.xml",
        ResponseTemplate::new(200).set_body_string(rss(&[(
            "SBI cuts lending rate",
            &format!("{}/articles/gone", base),
            "2024-05-01T10:00:00Z",
        )])),
    )
    .await;
    mount_get(&server, "/articles/gone", ResponseTemplate::new(404)).await;

    let config = create_test_config(
        &base,
        dir.path(),
        &format!(
            r#"
[[source]]
id = "markets"
kind = "feed"
endpoint = "{}/rss.xml"
"#,
            base
        ),
    );
    seed_checkpoints(&config, &[("markets", old_feed_cursor())]);

    let report = run(&config).await.expect("Run failed");
    assert_eq!(report.sources[0].resolution_failures, 1);

    let archived = JsonArticleArchive::new(&config.run.archive_path)
        .load_all()
        .unwrap();
    assert_eq!(archived.len(), 1);
    assert!(!archived[0].content_resolved);
    assert_eq!(archived[0].title, "SBI cuts lending rate");
    assert_eq!(archived[0].content, "Summary of SBI cuts lending rate");
}

#[tokio::test]
async fn test_first_feed_scan_only_records_baseline() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_get(
        &server,
        "/rss.xml",
        ResponseTemplate::new(200).set_body_string(rss(&[(
            "Reliance AGM date set",
            &format!("{}/articles/agm", base),
            "2024-05-01T10:00:00Z",
        )])),
    )
    .await;

    let config = create_test_config(
        &base,
        dir.path(),
        &format!(
            r#"
[[source]]
id = "markets"
kind = "feed"
endpoint = "{}/rss.xml"
"#,
            base
        ),
    );

    let report = run(&config).await.expect("Run failed");
    assert_eq!(report.checkpoint_state, CheckpointState::Missing);
    assert!(report.matched.is_empty());
    assert!(matches!(
        stored_checkpoints(&config).get("markets"),
        Some(Cursor::Timestamp(_))
    ));
}

#[tokio::test]
async fn test_authenticated_listing_uses_bearer_token() {
    use nifty_sentry::sources::RedditCredentials;
    use wiremock::matchers::header;

    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-123", "token_type": "bearer", "expires_in": 86400
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/r/stocks/new.json"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": { "children": [
                { "kind": "t3", "data": {
                    "id": "q1", "title": "ICICI Bank Q1 preview", "is_self": true,
                    "permalink": "/r/stocks/comments/q1/icici/", "selftext": "Numbers soon",
                    "created_utc": 1714557600.0
                }}
            ]}
        })))
        .mount(&server)
        .await;

    let mut config = create_test_config(
        &base,
        dir.path(),
        r#"
[[source]]
id = "r-stocks"
kind = "listing"
endpoint = "stocks"
"#,
    );
    config.listing.oauth_url = base.clone();
    config.listing.auth_url = format!("{}/api/v1/access_token", base);

    let credentials = RedditCredentials::from_lookup(|key| Some(format!("{}-value", key)));
    let client = build_http_client(&config.http).unwrap();
    let coordinator = Coordinator::from_config(&config, client, credentials).unwrap();

    let mut checkpoints = JsonCheckpointStore::new(&config.run.checkpoint_path);
    let mut archive = JsonArticleArchive::new(&config.run.archive_path);
    let report = run_with(
        &coordinator,
        &config.sources,
        &mut checkpoints,
        &mut archive,
        false,
    )
    .await
    .expect("Authenticated run failed");

    assert_eq!(report.failed_sources(), 0);
    assert_eq!(report.matched.len(), 1);
    assert_eq!(report.matched[0].matched_entity, "ICICI Bank");
}
