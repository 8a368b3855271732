//! Forum listing transport (Reddit) and id-boundary selection
//!
//! A listing page is ordered newest-first. The cursor is the id of the newest
//! post seen by the previous scan: everything ahead of it on the page is new,
//! and the scan stops at it.

use crate::config::ListingConfig;
use crate::matcher::normalize_title;
use crate::sources::{CandidateItem, FetchBatch, Source};
use crate::state::Cursor;
use crate::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A post as returned by the listing endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListingPost {
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Target of a link post; the permalink for self posts
    #[serde(default)]
    pub url: String,

    /// Absolute discussion URL
    #[serde(default)]
    pub permalink: String,

    #[serde(default)]
    pub is_self: bool,

    #[serde(default)]
    pub selftext: String,

    #[serde(default)]
    pub created_utc: f64,
}

impl ListingPost {
    fn into_candidate(self, source_id: &str) -> CandidateItem {
        let linked = !self.is_self && !self.url.is_empty() && self.url != self.permalink;
        let published_at = DateTime::<Utc>::from_timestamp(self.created_utc as i64, 0);

        let (url, body) = if linked {
            (self.url, None)
        } else {
            (self.permalink, Some(self.selftext))
        };

        CandidateItem {
            source_id: source_id.to_string(),
            external_id: self.id,
            title: normalize_title(&self.title),
            published_at,
            body,
            url,
            linked,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: ListingPost,
}

/// Parses a listing document, making permalinks and relative post URLs
/// absolute against `base_url`
pub fn parse_listing(json: &str, base_url: &str) -> Result<Vec<ListingPost>, serde_json::Error> {
    let listing: Listing = serde_json::from_str(json)?;
    let base = base_url.trim_end_matches('/');

    Ok(listing
        .data
        .children
        .into_iter()
        .map(|child| {
            let mut post = child.data;
            if post.permalink.starts_with('/') {
                post.permalink = format!("{}{}", base, post.permalink);
            }
            // crossposts link to another discussion by path
            if post.url.starts_with('/') && !post.url.starts_with("//") {
                post.url = format!("{}{}", base, post.url);
            }
            post
        })
        .collect())
}

/// Selects posts ahead of `last_seen` on a newest-first page
///
/// Returns the candidates in page order and the cursor to persist: the id of
/// the first post on the page, or `last_seen` unchanged when the page is empty.
pub fn select_unseen_posts(
    source_id: &str,
    posts: Vec<ListingPost>,
    last_seen: Option<&str>,
) -> (Vec<CandidateItem>, Option<Cursor>) {
    let newest = posts.first().map(|post| Cursor::ItemId(post.id.clone()));

    let mut candidates = Vec::new();
    for post in posts {
        if last_seen == Some(post.id.as_str()) {
            break;
        }
        candidates.push(post.into_candidate(source_id));
    }

    let cursor = newest.or_else(|| last_seen.map(|id| Cursor::ItemId(id.to_string())));
    (candidates, cursor)
}

/// Retrieves the newest posts of a community
#[async_trait]
pub trait ListingClient: Send + Sync {
    async fn fetch_newest(&self, community: &str, limit: u32)
        -> Result<Vec<ListingPost>, SourceError>;
}

/// Script-app credentials for the password grant
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

/// Credential variables, each with the older `.env` spelling it replaces
const CREDENTIAL_VARS: [(&str, &str); 4] = [
    ("REDDIT_CLIENT_ID", "Client_id"),
    ("REDDIT_CLIENT_SECRET", "Client_secret"),
    ("REDDIT_USERNAME", "User_name"),
    ("REDDIT_PASSWORD", "Password"),
];

impl RedditCredentials {
    /// Reads `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`, `REDDIT_USERNAME` and
    /// `REDDIT_PASSWORD`; `None` unless all four are set
    ///
    /// `Client_id`, `Client_secret`, `User_name` and `Password` are accepted
    /// in place of any of them.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let values: Vec<Option<String>> = CREDENTIAL_VARS
            .iter()
            .map(|(name, legacy)| {
                get(name).or_else(|| {
                    let value = get(legacy);
                    if value.is_some() {
                        tracing::info!("Reading {} from {}", name, legacy);
                    }
                    value
                })
            })
            .collect();

        if values.iter().all(Option::is_none) {
            return None;
        }

        let missing: Vec<&str> = CREDENTIAL_VARS
            .iter()
            .zip(&values)
            .filter(|(_, value)| value.is_none())
            .map(|((name, _), _)| *name)
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                "Listing credentials incomplete (missing {}), using public access",
                missing.join(", ")
            );
            return None;
        }

        let mut values = values.into_iter().flatten();
        Some(Self {
            client_id: values.next()?,
            client_secret: values.next()?,
            username: values.next()?,
            password: values.next()?,
        })
    }
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// Listing transport against Reddit's JSON API
///
/// Without credentials the public host is used. With credentials a bearer
/// token is requested once and shared by every listing source in the run.
pub struct RedditClient {
    client: Client,
    config: ListingConfig,
    credentials: Option<RedditCredentials>,
    token: OnceCell<String>,
}

impl RedditClient {
    pub fn new(client: Client, config: ListingConfig, credentials: Option<RedditCredentials>) -> Self {
        Self {
            client,
            config,
            credentials,
            token: OnceCell::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    async fn access_token(&self, credentials: &RedditCredentials) -> Result<&str, SourceError> {
        self.token
            .get_or_try_init(|| self.request_token(credentials))
            .await
            .map(String::as_str)
    }

    async fn request_token(&self, credentials: &RedditCredentials) -> Result<String, SourceError> {
        tracing::debug!("Requesting listing access token for {}", credentials.username);

        let response = self
            .client
            .post(&self.config.auth_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Auth(format!(
                "token endpoint returned {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Auth(e.to_string()))?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Auth(e.to_string()))?;

        match token.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) => Ok(access_token),
            None => Err(SourceError::Auth(
                token
                    .error
                    .unwrap_or_else(|| "no access token in response".to_string()),
            )),
        }
    }
}

#[async_trait]
impl ListingClient for RedditClient {
    async fn fetch_newest(
        &self,
        community: &str,
        limit: u32,
    ) -> Result<Vec<ListingPost>, SourceError> {
        let (host, token) = match &self.credentials {
            Some(credentials) => (
                self.config.oauth_url.as_str(),
                Some(self.access_token(credentials).await?),
            ),
            None => (self.config.base_url.as_str(), None),
        };

        let url = format!(
            "{}/r/{}/new.json?limit={}&raw_json=1",
            host.trim_end_matches('/'),
            community,
            limit
        );
        tracing::debug!("Fetching listing {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| SourceError::Http {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| SourceError::Http {
            url: url.clone(),
            source,
        })?;

        parse_listing(&body, &self.config.base_url).map_err(|e| SourceError::Malformed {
            url,
            message: e.to_string(),
        })
    }
}

/// Adapter for [`crate::SourceKind::Listing`] sources
#[derive(Clone)]
pub struct ListingAdapter {
    client: Arc<dyn ListingClient>,
    page_size: u32,
}

impl ListingAdapter {
    pub fn new(client: Arc<dyn ListingClient>, page_size: u32) -> Self {
        Self { client, page_size }
    }

    /// Fetches the newest page and selects posts ahead of the id cursor
    pub async fn fetch_since(
        &self,
        source: &Source,
        cursor: Option<&Cursor>,
    ) -> Result<FetchBatch, SourceError> {
        let last_seen = match cursor {
            Some(Cursor::ItemId(id)) => Some(id.as_str()),
            Some(other) => {
                tracing::warn!(
                    "[{}] Ignoring cursor {} that is not an item id",
                    source.id,
                    other
                );
                None
            }
            None => None,
        };

        let posts = self
            .client
            .fetch_newest(&source.endpoint, self.page_size)
            .await?;
        let fetched = posts.len();

        if last_seen.is_none() {
            tracing::info!(
                "[{}] First scan, every post on the page is a candidate",
                source.id
            );
        }

        let (candidates, cursor) = select_unseen_posts(&source.id, posts, last_seen);

        Ok(FetchBatch {
            candidates,
            cursor,
            fetched,
            skipped: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceKind;

    fn post(id: &str, title: &str) -> ListingPost {
        ListingPost {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("https://news.example/{}", id),
            permalink: format!("https://www.reddit.com/r/stocks/comments/{}/x/", id),
            is_self: false,
            selftext: String::new(),
            created_utc: 1_714_557_600.0,
        }
    }

    fn source() -> Source {
        Source {
            id: "r-stocks".to_string(),
            kind: SourceKind::Listing,
            endpoint: "stocks".to_string(),
        }
    }

    struct StaticListing(Vec<ListingPost>);

    #[async_trait]
    impl ListingClient for StaticListing {
        async fn fetch_newest(
            &self,
            _community: &str,
            _limit: u32,
        ) -> Result<Vec<ListingPost>, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenListing;

    #[async_trait]
    impl ListingClient for BrokenListing {
        async fn fetch_newest(
            &self,
            community: &str,
            _limit: u32,
        ) -> Result<Vec<ListingPost>, SourceError> {
            Err(SourceError::Status {
                url: format!("https://www.reddit.com/r/{}/new.json", community),
                status: 500,
            })
        }
    }

    fn page() -> Vec<ListingPost> {
        vec![post("p3", "third"), post("p2", "second"), post("p1", "first")]
    }

    fn ids(candidates: &[CandidateItem]) -> Vec<&str> {
        candidates.iter().map(|c| c.external_id.as_str()).collect()
    }

    #[test]
    fn test_stops_at_last_seen() {
        let (candidates, cursor) = select_unseen_posts("r-stocks", page(), Some("p1"));
        assert_eq!(ids(&candidates), vec!["p3", "p2"]);
        assert_eq!(cursor, Some(Cursor::ItemId("p3".into())));
    }

    #[test]
    fn test_cursor_mid_page() {
        let (candidates, cursor) = select_unseen_posts("r-stocks", page(), Some("p2"));
        assert_eq!(ids(&candidates), vec!["p3"]);
        assert_eq!(cursor, Some(Cursor::ItemId("p3".into())));
    }

    #[test]
    fn test_rescan_yields_nothing() {
        let (candidates, cursor) = select_unseen_posts("r-stocks", page(), Some("p3"));
        assert!(candidates.is_empty());
        assert_eq!(cursor, Some(Cursor::ItemId("p3".into())));
    }

    #[test]
    fn test_no_cursor_takes_whole_page() {
        let (candidates, cursor) = select_unseen_posts("r-stocks", page(), None);
        assert_eq!(ids(&candidates), vec!["p3", "p2", "p1"]);
        assert_eq!(cursor, Some(Cursor::ItemId("p3".into())));
    }

    #[test]
    fn test_cursor_beyond_page_takes_whole_page() {
        let (candidates, _) = select_unseen_posts("r-stocks", page(), Some("p0"));
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn test_empty_page_keeps_cursor() {
        let (candidates, cursor) = select_unseen_posts("r-stocks", Vec::new(), Some("p1"));
        assert!(candidates.is_empty());
        assert_eq!(cursor, Some(Cursor::ItemId("p1".into())));

        let (_, cursor) = select_unseen_posts("r-stocks", Vec::new(), None);
        assert_eq!(cursor, None);
    }

    #[test]
    fn test_self_post_uses_permalink_and_body() {
        let mut discussion = post("p9", "Thoughts on  ITC?");
        discussion.is_self = true;
        discussion.url = discussion.permalink.clone();
        discussion.selftext = "Long-term hold?".to_string();

        let candidate = discussion.into_candidate("r-stocks");
        assert!(!candidate.linked);
        assert_eq!(candidate.url, "https://www.reddit.com/r/stocks/comments/p9/x/");
        assert_eq!(candidate.body.as_deref(), Some("Long-term hold?"));
        assert_eq!(candidate.title, "Thoughts on ITC?");
    }

    #[test]
    fn test_link_post_is_resolvable() {
        let candidate = post("p4", "TCS wins deal").into_candidate("r-stocks");
        assert!(candidate.linked);
        assert_eq!(candidate.url, "https://news.example/p4");
        assert!(candidate.body.is_none());
        assert!(candidate.published_at.is_some());
    }

    #[test]
    fn test_parse_listing() {
        let json = r#"{
            "kind": "Listing",
            "data": {
                "after": null,
                "children": [
                    {"kind": "t3", "data": {
                        "id": "abc", "title": "Infosys &amp; peers", "url": "https://news.example/a",
                        "permalink": "/r/stocks/comments/abc/infosys/", "is_self": false,
                        "selftext": "", "created_utc": 1714557600.0, "score": 12
                    }}
                ]
            }
        }"#;

        let posts = parse_listing(json, "https://www.reddit.com/").unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "abc");
        assert_eq!(
            posts[0].permalink,
            "https://www.reddit.com/r/stocks/comments/abc/infosys/"
        );
        assert_eq!(
            posts[0].clone().into_candidate("r-stocks").title,
            "Infosys & peers"
        );
    }

    #[test]
    fn test_parse_listing_absolutizes_crosspost_url() {
        let json = r#"{"kind": "Listing", "data": {"children": [
            {"kind": "t3", "data": {
                "id": "xp1", "title": "TCS buyback thread", "is_self": false,
                "url": "/r/IndiaInvestments/comments/orig/tcs_buyback/",
                "permalink": "/r/stocks/comments/xp1/tcs_buyback/"
            }}
        ]}}"#;

        let posts = parse_listing(json, "https://www.reddit.com").unwrap();
        let candidate = posts[0].clone().into_candidate("r-stocks");

        assert!(candidate.linked);
        assert_eq!(
            candidate.url,
            "https://www.reddit.com/r/IndiaInvestments/comments/orig/tcs_buyback/"
        );
    }

    #[test]
    fn test_parse_listing_rejects_garbage() {
        assert!(parse_listing("<html>blocked</html>", "https://www.reddit.com").is_err());
    }

    #[test]
    fn test_credentials_require_all_values() {
        let full = |key: &str| Some(format!("{}-value", key));
        let creds = RedditCredentials::from_lookup(full).unwrap();
        assert_eq!(creds.username, "REDDIT_USERNAME-value");
        assert!(!format!("{:?}", creds).contains("REDDIT_PASSWORD-value"));

        let missing_password = |key: &str| {
            (key.starts_with("REDDIT_") && key != "REDDIT_PASSWORD").then(|| "x".to_string())
        };
        assert!(RedditCredentials::from_lookup(missing_password).is_none());

        let blank = |_: &str| Some("  ".to_string());
        assert!(RedditCredentials::from_lookup(blank).is_none());

        assert!(RedditCredentials::from_lookup(|_| None).is_none());
    }

    #[test]
    fn test_credentials_accept_dotenv_names() {
        let legacy = |key: &str| match key {
            "Client_id" => Some("id".to_string()),
            "Client_secret" => Some("secret".to_string()),
            "User_name" => Some("trader".to_string()),
            "Password" => Some("hunter2".to_string()),
            "REDDIT_USERNAME" => Some("newer".to_string()),
            _ => None,
        };

        let creds = RedditCredentials::from_lookup(legacy).unwrap();
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.client_secret, "secret");
        assert_eq!(creds.username, "newer");
        assert_eq!(creds.password, "hunter2");
    }

    #[tokio::test]
    async fn test_adapter_advances_cursor() {
        let adapter = ListingAdapter::new(Arc::new(StaticListing(page())), 50);
        let prior = Cursor::ItemId("p1".into());

        let batch = adapter.fetch_since(&source(), Some(&prior)).await.unwrap();
        assert_eq!(ids(&batch.candidates), vec!["p3", "p2"]);
        assert_eq!(batch.fetched, 3);
        assert_eq!(batch.cursor, Some(Cursor::ItemId("p3".into())));

        let again = adapter
            .fetch_since(&source(), batch.cursor.as_ref())
            .await
            .unwrap();
        assert!(again.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_adapter_failure_propagates() {
        let adapter = ListingAdapter::new(Arc::new(BrokenListing), 50);
        let prior = Cursor::ItemId("p1".into());

        let result = adapter.fetch_since(&source(), Some(&prior)).await;
        assert!(matches!(result, Err(SourceError::Status { status: 500, .. })));
    }
}
