//! RSS feed transport and freshness selection
//!
//! A feed's cursor is the instant its previous scan completed. Entries
//! published strictly after that instant are new; entries whose date cannot be
//! read are skipped. The very first scan of a feed only records the baseline.

use crate::matcher::normalize_title;
use crate::sources::{parse_timestamp, CandidateItem, FetchBatch, Source};
use crate::state::Cursor;
use crate::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use reqwest::Client;
use scraper::Html;
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;

/// One `<item>` of a feed, before any interpretation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
    pub guid: Option<String>,
    /// Raw publication date (`pubDate`, falling back to `dc:date`)
    pub published: Option<String>,
    pub description: Option<String>,
}

/// Retrieves the entries of a feed document
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_entries(&self, endpoint: &str) -> Result<Vec<FeedEntry>, SourceError>;
}

/// Feed transport over HTTP
pub struct HttpFeedClient {
    client: Client,
}

impl HttpFeedClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_entries(&self, endpoint: &str) -> Result<Vec<FeedEntry>, SourceError> {
        tracing::debug!("Fetching feed {}", endpoint);

        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|source| SourceError::Http {
                url: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| SourceError::Http {
            url: endpoint.to_string(),
            source,
        })?;

        parse_rss(&body).map_err(|e| SourceError::Malformed {
            url: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "date", alias = "dc:date")]
    dc_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parses an RSS 2.0 document into its entries, in document order
///
/// HTML named entities (`&trade;`, `&eacute;`, ...) are resolved before the
/// document reaches the XML deserializer, so one item using them cannot fail
/// the whole feed.
pub fn parse_rss(xml: &str) -> Result<Vec<FeedEntry>, quick_xml::DeError> {
    let cleaned = resolve_html_entities(xml);
    let rss: Rss = from_str(&cleaned)?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .map(|item| FeedEntry {
            title: item.title.unwrap_or_default(),
            link: non_blank(item.link),
            guid: non_blank(item.guid.map(|g| g.value)),
            published: non_blank(item.pub_date).or_else(|| non_blank(item.dc_date)),
            description: non_blank(item.description),
        })
        .collect())
}

const XML_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];
const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Rewrites every `&` outside CDATA into something an XML parser accepts
///
/// XML's own entities and numeric references pass through. Known HTML
/// entities are replaced by their (re-escaped) text, and unknown references or
/// bare ampersands become literal text.
fn resolve_html_entities(xml: &str) -> Cow<'_, str> {
    if !xml.contains('&') {
        return Cow::Borrowed(xml);
    }

    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;

    while let Some(pos) = rest.find(|c: char| c == '&' || c == '<') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with(CDATA_OPEN) {
            let end = tail
                .find(CDATA_CLOSE)
                .map_or(tail.len(), |i| i + CDATA_CLOSE.len());
            out.push_str(&tail[..end]);
            rest = &tail[end..];
        } else if tail.starts_with('<') {
            out.push('<');
            rest = &tail[1..];
        } else if let Some(reference) = entity_reference(tail) {
            out.push_str(&xml_safe_reference(reference));
            rest = &tail[reference.len()..];
        } else {
            out.push_str("&amp;");
            rest = &tail[1..];
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// The `&name;` or `&#nn;` reference at the start of `tail`, if well formed
fn entity_reference(tail: &str) -> Option<&str> {
    let body = &tail[1..];
    let len = body.find(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))?;
    if len == 0 || len > 32 || !body[len..].starts_with(';') {
        return None;
    }
    Some(&tail[..len + 2])
}

fn xml_safe_reference(reference: &str) -> Cow<'_, str> {
    let name = &reference[1..reference.len() - 1];

    if let Some(number) = name.strip_prefix('#') {
        let valid = match number
            .strip_prefix('x')
            .or_else(|| number.strip_prefix('X'))
        {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()),
        };
        return if valid {
            Cow::Borrowed(reference)
        } else {
            Cow::Owned(format!("&amp;{}", &reference[1..]))
        };
    }

    if XML_ENTITIES.contains(&name) {
        return Cow::Borrowed(reference);
    }

    let decoded = html_escape::decode_html_entities(reference);
    if decoded == reference {
        tracing::debug!("Unknown entity {} kept as text", reference);
        return Cow::Owned(format!("&amp;{}", &reference[1..]));
    }

    let text = decoded.replace('\u{a0}', " ");
    Cow::Owned(html_escape::encode_safe(&text).into_owned())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Selects the entries published strictly after `since`
///
/// Returns the candidates in feed order and the number of entries skipped for
/// an unreadable date or a missing link.
pub fn select_fresh_entries(
    source_id: &str,
    entries: Vec<FeedEntry>,
    since: DateTime<Utc>,
) -> (Vec<CandidateItem>, usize) {
    let mut candidates = Vec::new();
    let mut skipped = 0;

    for entry in entries {
        let Some(published) = entry.published.as_deref().and_then(parse_timestamp) else {
            tracing::debug!(
                "[{}] Skipping entry with unreadable date: {:?}",
                source_id,
                entry.published
            );
            skipped += 1;
            continue;
        };

        if published <= since {
            continue;
        }

        let url = entry
            .link
            .clone()
            .or_else(|| entry.guid.clone().filter(|g| g.starts_with("http")));
        let Some(url) = url else {
            tracing::debug!("[{}] Skipping entry without link: {}", source_id, entry.title);
            skipped += 1;
            continue;
        };

        candidates.push(CandidateItem {
            source_id: source_id.to_string(),
            external_id: entry.guid.unwrap_or_else(|| url.clone()),
            title: normalize_title(&entry.title),
            published_at: Some(published),
            body: entry.description.as_deref().map(description_text),
            url,
            linked: true,
        });
    }

    (candidates, skipped)
}

/// Flattens an HTML description to plain text
fn description_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: Vec<&str> = fragment.root_element().text().collect();
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Adapter for [`crate::SourceKind::Feed`] sources
#[derive(Clone)]
pub struct FeedAdapter {
    client: Arc<dyn FeedClient>,
}

impl FeedAdapter {
    pub fn new(client: Arc<dyn FeedClient>) -> Self {
        Self { client }
    }

    /// Fetches the feed and selects entries newer than the timestamp cursor
    ///
    /// The returned cursor is the scan completion time, never earlier than
    /// the prior cursor.
    pub async fn fetch_since(
        &self,
        source: &Source,
        cursor: Option<&Cursor>,
    ) -> Result<FetchBatch, SourceError> {
        let since = match cursor {
            Some(Cursor::Timestamp(ts)) => Some(*ts),
            Some(other) => {
                tracing::warn!(
                    "[{}] Ignoring cursor {} that is not a timestamp",
                    source.id,
                    other
                );
                None
            }
            None => None,
        };

        let entries = self.client.fetch_entries(&source.endpoint).await?;
        let fetched = entries.len();
        let scanned_at = Utc::now();

        let (candidates, skipped) = match since {
            Some(since) => select_fresh_entries(&source.id, entries, since),
            None => {
                tracing::info!(
                    "[{}] First scan, recording baseline ({} existing entries treated as seen)",
                    source.id,
                    fetched
                );
                (Vec::new(), 0)
            }
        };

        let next = since.map_or(scanned_at, |prev| prev.max(scanned_at));

        Ok(FetchBatch {
            candidates,
            cursor: Some(Cursor::Timestamp(next)),
            fetched,
            skipped,
        })
    }
}
