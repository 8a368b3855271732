//! Content resolution for matched items
//!
//! A matched item whose URL points at an external article is fetched once
//! and reduced to title plus body text.

use crate::ingest::extract::extract_article;
use crate::ResolveError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Readable content of a resolved page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub title: Option<String>,
    pub body: String,
}

/// Turns an article URL into readable content
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve(&self, url: &str, timeout: Duration)
        -> Result<ResolvedContent, ResolveError>;
}

/// Resolver that downloads the page and runs article extraction on it
pub struct HttpResolver {
    client: Client,
}

impl HttpResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentResolver for HttpResolver {
    async fn resolve(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<ResolvedContent, ResolveError> {
        tracing::debug!("Resolving article {}", url);

        let http_error = |source: reqwest::Error| {
            if source.is_timeout() {
                ResolveError::Timeout {
                    url: url.to_string(),
                }
            } else {
                ResolveError::Http {
                    url: url.to_string(),
                    source,
                }
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(http_error)?;
        let article = extract_article(&html);

        if article.text.is_empty() {
            return Err(ResolveError::Empty {
                url: url.to_string(),
            });
        }

        Ok(ResolvedContent {
            title: article.title,
            body: article.text,
        })
    }
}
