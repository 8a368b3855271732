//! Article extraction from HTML pages
//!
//! A small readability pass: pick the element most likely to hold the story,
//! then keep its paragraphs. Navigation, scripts and boilerplate outside that
//! element never reach the archive.

use scraper::{ElementRef, Html, Selector};

/// Title and plain-text body extracted from an article page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    /// The article title (og:title, then <title>, then the first <h1>)
    pub title: Option<String>,

    /// Paragraphs of the article body separated by blank lines
    pub text: String,
}

/// Containers tried in order when looking for the story body
const CONTAINER_SELECTORS: &[&str] = &[
    "article",
    "[itemprop='articleBody']",
    "main",
    "#content",
    "body",
];

/// Elements whose text is never part of an article
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "figcaption",
];

/// Extracts the readable title and body from an HTML document
///
/// # Arguments
///
/// * `html` - The HTML content to parse
///
/// # Example
///
/// ```
/// use nifty_sentry::ingest::extract_article;
///
/// let html = r#"<html><head><title>TCS wins deal</title></head>
///     <body><nav>Home</nav><article><p>TCS signed a contract.</p></article></body></html>"#;
/// let article = extract_article(html);
/// assert_eq!(article.title.as_deref(), Some("TCS wins deal"));
/// assert_eq!(article.text, "TCS signed a contract.");
/// ```
pub fn extract_article(html: &str) -> ExtractedArticle {
    let document = Html::parse_document(html);

    ExtractedArticle {
        title: extract_title(&document),
        text: extract_body(&document).unwrap_or_default(),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let og = Selector::parse("meta[property='og:title'][content]").ok()?;
    let og_title = document
        .select(&og)
        .next()
        .and_then(|e| e.value().attr("content"))
        .map(collapse);
    if let Some(title) = og_title.filter(|t| !t.is_empty()) {
        return Some(title);
    }

    ["title", "h1"].iter().find_map(|name| {
        let selector = Selector::parse(name).ok()?;
        document
            .select(&selector)
            .next()
            .map(|element| collapse(&element.text().collect::<String>()))
            .filter(|s| !s.is_empty())
    })
}

/// Returns the paragraphs of the first container that has any, falling back
/// to the plain text of the best container
fn extract_body(document: &Html) -> Option<String> {
    let paragraph = Selector::parse("p").ok()?;
    let mut fallback = None;

    for css in CONTAINER_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let Some(container) = document.select(&selector).next() else {
            continue;
        };

        let paragraphs: Vec<String> = container
            .select(&paragraph)
            .filter(|p| !inside_skipped(p))
            .map(|p| collapse(&p.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .collect();

        if !paragraphs.is_empty() {
            return Some(paragraphs.join("\n\n"));
        }

        if fallback.is_none() {
            fallback = Some(visible_text(container)).filter(|t| !t.is_empty());
        }
    }

    fallback
}

fn inside_skipped(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| SKIPPED_ELEMENTS.contains(&ancestor.value().name()))
}

/// Text of `container` excluding anything under a skipped element
fn visible_text(container: ElementRef) -> String {
    let parts: Vec<&str> = container
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|ancestor| SKIPPED_ELEMENTS.contains(&ancestor.value().name()));
            (!hidden).then_some(&**text)
        })
        .collect();
    collapse(&parts.join(" "))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
