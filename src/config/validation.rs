use crate::config::types::{
    Config, CrawlerConfig, FetcherConfig, OutputConfig, SourceConfig, SourceKind, UserAgentConfig,
};
use crate::normalize::Taxonomy;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_taxonomy(&config.taxonomy)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.page_delay_min_ms > config.page_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "page-delay-min-ms ({}) must not exceed page-delay-max-ms ({})",
            config.page_delay_min_ms, config.page_delay_max_ms
        )));
    }

    if config.max_consecutive_errors < 1 {
        return Err(ConfigError::Validation(format!(
            "max-consecutive-errors must be >= 1, got {}",
            config.max_consecutive_errors
        )));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.page_load_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "page-load-timeout-ms must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Validates the session identity headers
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    validate_header_value("user-agent", &config.user_agent)?;
    validate_header_value("accept-language", &config.accept_language)?;

    if let Some(cookie) = &config.cookie {
        validate_header_value("cookie", cookie)?;
    }

    Ok(())
}

/// Header values must stay on one line
fn validate_header_value(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.chars().any(|c| c == '\r' || c == '\n') {
        return Err(ConfigError::Validation(format!(
            "{} must not contain line breaks",
            name
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.diagnostics_dir.is_empty() {
        return Err(ConfigError::Validation(
            "diagnostics-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_taxonomy(taxonomy: &Taxonomy) -> Result<(), ConfigError> {
    for entry in &taxonomy.product_keywords {
        if entry.keyword.trim().is_empty() || entry.tag.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "product keyword entries need both keyword and tag, got '{}' -> '{}'",
                entry.keyword, entry.tag
            )));
        }
    }

    if taxonomy.default_location.trim().is_empty() {
        return Err(ConfigError::Validation(
            "taxonomy default-location cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the source list
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] must be configured".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for source in sources {
        validate_source_name(&source.name)?;
        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }
        validate_source(source)?;
    }

    Ok(())
}

/// Source names appear in logs and the database: keep them simple
fn validate_source_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "source name cannot be empty".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "source name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            name
        )));
    }

    Ok(())
}

fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&source.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid base-url '{}' for source '{}': {}",
            source.base_url, source.name, e
        ))
    })?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url '{}' must use http or https",
            source.base_url
        )));
    }

    if !source.search_url.contains("{page}") && !source.search_url.contains("{offset}") {
        return Err(ConfigError::Validation(format!(
            "search-url of source '{}' needs a {{page}} or {{offset}} placeholder",
            source.name
        )));
    }

    // The template must be a valid URL once placeholders are filled in
    let sample = source
        .search_url
        .replace("{page}", "1")
        .replace("{offset}", "0")
        .replace("{query}", "q");
    Url::parse(&sample).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid search-url '{}' for source '{}': {}",
            source.search_url, source.name, e
        ))
    })?;

    if source.page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "page-size of source '{}' must be >= 1",
            source.name
        )));
    }

    if source.max_fragments_per_page == Some(0) {
        return Err(ConfigError::Validation(format!(
            "max-fragments-per-page of source '{}' must be >= 1 when set",
            source.name
        )));
    }

    if source.kind == SourceKind::ClassifiedSearch {
        if !source.search_url.contains("{query}") {
            return Err(ConfigError::Validation(format!(
                "classified-search source '{}' needs a {{query}} placeholder",
                source.name
            )));
        }
        if source.queries.is_empty() {
            return Err(ConfigError::Validation(format!(
                "classified-search source '{}' needs at least one query",
                source.name
            )));
        }
    }

    if let Some(query) = source.queries.iter().find(|q| q.term.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "source '{}' has an empty query term (tag {:?})",
            source.name, query.tag
        )));
    }

    Ok(())
}
