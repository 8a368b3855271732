use crate::config::types::{Config, EntityEntry, HttpConfig, ListingConfig, RunConfig};
use crate::sources::{Source, SourceKind};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_run_config(&config.run)?;
    validate_http_config(&config.http)?;
    validate_listing_config(&config.listing)?;
    validate_sources(&config.sources)?;
    validate_entities(&config.entities)?;
    Ok(())
}

/// Validates run configuration
fn validate_run_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.checkpoint_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    if config.archive_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "archive_path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path == config.archive_path {
        return Err(ConfigError::Validation(format!(
            "checkpoint_path and archive_path must differ, both are '{}'",
            config.archive_path
        )));
    }

    if config.source_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "source_timeout_secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates HTTP client configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.resolve_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "resolve_timeout_secs must be >= 1, got {}",
            config.resolve_timeout_secs
        )));
    }

    Ok(())
}

/// Validates listing endpoints and page size
fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("base_url", &config.base_url),
        ("oauth_url", &config.oauth_url),
        ("auth_url", &config.auth_url),
    ] {
        validate_http_url(value).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid listing {} '{}': {}", name, value, e))
        })?;
    }

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    Ok(())
}

/// Validates the configured sources
fn validate_sources(sources: &[Source]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source id cannot be empty".to_string(),
            ));
        }

        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id '{}'",
                source.id
            )));
        }

        match source.kind {
            SourceKind::Feed => {
                validate_http_url(&source.endpoint).map_err(|e| {
                    ConfigError::InvalidUrl(format!(
                        "Invalid feed endpoint '{}' for source '{}': {}",
                        source.endpoint, source.id, e
                    ))
                })?;
            }
            SourceKind::Listing => validate_community_name(&source.id, &source.endpoint)?,
        }
    }

    Ok(())
}

/// Validates entity alias groups
fn validate_entities(entities: &[EntityEntry]) -> Result<(), ConfigError> {
    for entity in entities {
        if entity.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "entity name cannot be empty".to_string(),
            ));
        }

        if entity.aliases.is_empty() || entity.aliases.iter().any(|a| a.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "entity '{}' needs at least one alias and no blank aliases",
                entity.name
            )));
        }
    }

    Ok(())
}

/// Checks that a string is an absolute http(s) URL
fn validate_http_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}

/// Community names are 2-21 characters of letters, digits, and underscores
fn validate_community_name(source_id: &str, name: &str) -> Result<(), ConfigError> {
    let valid_len = (2..=21).contains(&name.len());
    if !valid_len || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Validation(format!(
            "listing endpoint for source '{}' must be a community name, got '{}'",
            source_id, name
        )));
    }
    Ok(())
}
