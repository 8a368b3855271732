use crate::sources::Source;
use serde::Deserialize;

/// Main configuration structure for Nifty-Sentry
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<Source>,
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityEntry>,
}

/// Per-run behaviour and persisted state locations
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Path to the JSON checkpoint document
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,

    /// Path to the JSON article archive
    #[serde(rename = "archive-path")]
    pub archive_path: String,

    /// What to do with a match whose article could not be resolved
    #[serde(rename = "on-resolution-failure", default)]
    pub on_resolution_failure: ResolutionPolicy,

    /// Upper bound on a single source's worker, in seconds
    #[serde(rename = "source-timeout-secs", default)]
    pub source_timeout_secs: Option<u64>,
}

/// Handling of matches whose linked article cannot be resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Keep the match, archived without the article body
    #[default]
    Keep,
    /// Discard the match entirely
    Drop,
}

/// HTTP client configuration shared by every transport
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for feed and listing requests (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for article resolution (seconds)
    #[serde(rename = "resolve-timeout-secs", default = "default_timeout_secs")]
    pub resolve_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_timeout_secs(),
            resolve_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Forum listing (Reddit) endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Public host used when no credentials are configured
    #[serde(rename = "base-url", default = "default_listing_base")]
    pub base_url: String,

    /// Host used with a bearer token
    #[serde(rename = "oauth-url", default = "default_listing_oauth")]
    pub oauth_url: String,

    /// Token endpoint for the password grant
    #[serde(rename = "auth-url", default = "default_listing_auth")]
    pub auth_url: String,

    /// Number of newest posts fetched per community
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            base_url: default_listing_base(),
            oauth_url: default_listing_oauth(),
            auth_url: default_listing_auth(),
            page_size: default_page_size(),
        }
    }
}

/// A canonical entity and the aliases that identify it in a headline
#[derive(Debug, Clone, Deserialize)]
pub struct EntityEntry {
    pub name: String,
    pub aliases: Vec<String>,
}

fn default_user_agent() -> String {
    format!("nifty-sentry/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_listing_base() -> String {
    "https://www.reddit.com".to_string()
}

fn default_listing_oauth() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_listing_auth() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}

fn default_page_size() -> u32 {
    50
}
