//! Headline matching against a fixed entity alias table
//!
//! A [`Matcher`] is built once at startup from the configured entities (or the
//! built-in table) and shared read-only by every worker.

mod entities;

pub use entities::default_entities;

use crate::config::EntityEntry;
use regex::{Regex, RegexSet};

/// A successful headline match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMatch {
    /// Canonical entity name, e.g. "Reliance"
    pub entity: String,

    /// The configured alias that matched, e.g. "RIL"
    pub alias: String,
}

struct CompiledEntity {
    name: String,
    aliases: Vec<(String, Regex)>,
}

/// Case-insensitive, whole-word matcher over grouped aliases
///
/// When aliases of several entities occur in one headline, the entity listed
/// first in the table wins, and within that entity the first listed alias is
/// reported. Position in the headline plays no part in the choice.
///
/// # Examples
///
/// ```
/// use nifty_sentry::matcher::Matcher;
///
/// let matcher = Matcher::with_defaults().unwrap();
///
/// let hit = matcher.find("RIL reports profit").unwrap();
/// assert_eq!(hit.entity, "Reliance");
///
/// assert!(matcher.find("APRILFOOL").is_none());
/// ```
pub struct Matcher {
    entities: Vec<CompiledEntity>,
    set: RegexSet,
}

impl Matcher {
    /// Builds a matcher from entity alias groups, preserving their order
    pub fn new(entries: &[EntityEntry]) -> Result<Self, regex::Error> {
        let mut entities = Vec::with_capacity(entries.len());
        let mut group_patterns = Vec::with_capacity(entries.len());

        for entry in entries {
            let mut aliases = Vec::with_capacity(entry.aliases.len());
            let mut parts = Vec::with_capacity(entry.aliases.len());
            for alias in &entry.aliases {
                let alias = alias.trim();
                let part = bounded(alias);
                aliases.push((alias.to_string(), Regex::new(&format!("(?i){}", part))?));
                parts.push(part);
            }
            group_patterns.push(format!("(?i)(?:{})", parts.join("|")));
            entities.push(CompiledEntity {
                name: entry.name.clone(),
                aliases,
            });
        }

        let set = RegexSet::new(&group_patterns)?;
        Ok(Self { entities, set })
    }

    /// Builds a matcher over the built-in NIFTY-50 alias table
    pub fn with_defaults() -> Result<Self, regex::Error> {
        Self::new(&default_entities())
    }

    /// Builds a matcher from configuration, falling back to the built-in table
    pub fn from_config(entries: &[EntityEntry]) -> Result<Self, regex::Error> {
        if entries.is_empty() {
            Self::with_defaults()
        } else {
            Self::new(entries)
        }
    }

    /// Returns the first matching entity for a headline, if any
    pub fn find(&self, title: &str) -> Option<EntityMatch> {
        let index = self.set.matches(title).iter().next()?;
        let entity = &self.entities[index];
        let alias = entity
            .aliases
            .iter()
            .find(|(_, re)| re.is_match(title))
            .map(|(alias, _)| alias.clone())?;

        Some(EntityMatch {
            entity: entity.name.clone(),
            alias,
        })
    }

    /// Returns true if any alias occurs in the headline
    pub fn is_match(&self, title: &str) -> bool {
        self.set.is_match(title)
    }

    /// Number of entity groups
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Canonical entity names in table order
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }
}

/// Escapes an alias and wraps word-character edges in `\b`
///
/// An alias edge that is punctuation (e.g. "(RIL)") gets no boundary, since
/// `\b` next to a non-word character would require a word character outside.
fn bounded(alias: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let left = alias.chars().next().is_some_and(is_word);
    let right = alias.chars().last().is_some_and(is_word);

    format!(
        "{}{}{}",
        if left { r"\b" } else { "" },
        regex::escape(alias),
        if right { r"\b" } else { "" }
    )
}

/// Normalizes a headline before matching
///
/// Decodes HTML entities left behind by feed producers and collapses runs of
/// whitespace.
pub fn normalize_title(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
