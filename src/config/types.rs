use crate::normalize::Taxonomy;
use serde::Deserialize;

/// Main configuration structure for Listing-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Standalone taxonomy file, resolved relative to the config file.
    /// Replaces the inline `[taxonomy]` table when set.
    #[serde(rename = "taxonomy-file", default)]
    pub taxonomy_file: Option<String>,

    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub fetcher: FetcherConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    pub output: OutputConfig,

    #[serde(default)]
    pub taxonomy: Taxonomy,

    #[serde(rename = "source", default)]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a configured source by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Crawl scheduling and pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages requested per source segment
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Lower bound of the randomized delay between pages (milliseconds)
    #[serde(rename = "page-delay-min-ms", default = "default_page_delay_min_ms")]
    pub page_delay_min_ms: u64,

    /// Upper bound of the randomized delay between pages (milliseconds)
    #[serde(rename = "page-delay-max-ms", default = "default_page_delay_max_ms")]
    pub page_delay_max_ms: u64,

    /// Requests to one source before a forced long break (0 disables)
    #[serde(rename = "request-budget", default = "default_request_budget")]
    pub request_budget: u32,

    /// Length of the forced break (milliseconds)
    #[serde(rename = "budget-cooldown-ms", default = "default_budget_cooldown_ms")]
    pub budget_cooldown_ms: u64,

    /// Consecutive failed pages after which a source is aborted
    #[serde(rename = "max-consecutive-errors", default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Wait after a failed page before moving on (milliseconds)
    #[serde(rename = "error-cooldown-ms", default = "default_error_cooldown_ms")]
    pub error_cooldown_ms: u64,

    /// Extra attempts at an empty first page before applying the source policy
    #[serde(rename = "first-page-retries", default)]
    pub first_page_retries: u32,

    /// Crawl sources concurrently, one session per source
    #[serde(rename = "parallel-sources", default)]
    pub parallel_sources: bool,
}

fn default_page_delay_min_ms() -> u64 {
    3_000
}

fn default_page_delay_max_ms() -> u64 {
    6_000
}

fn default_request_budget() -> u32 {
    100
}

fn default_budget_cooldown_ms() -> u64 {
    120_000
}

fn default_max_consecutive_errors() -> u32 {
    3
}

fn default_error_cooldown_ms() -> u64 {
    10_000
}

/// Page load behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(rename = "page-load-timeout-ms", default = "default_page_load_timeout_ms")]
    pub page_load_timeout_ms: u64,

    /// Wait before the single retry of a failed navigation
    #[serde(rename = "retry-cooldown-ms", default = "default_retry_cooldown_ms")]
    pub retry_cooldown_ms: u64,

    /// Wait after navigation before reading the page
    #[serde(rename = "settle-delay-ms", default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Pages smaller than this are re-read once after `recheck-delay-ms`
    #[serde(rename = "min-content-bytes", default = "default_min_content_bytes")]
    pub min_content_bytes: usize,

    #[serde(rename = "recheck-delay-ms", default = "default_recheck_delay_ms")]
    pub recheck_delay_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            page_load_timeout_ms: default_page_load_timeout_ms(),
            retry_cooldown_ms: default_retry_cooldown_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            min_content_bytes: default_min_content_bytes(),
            recheck_delay_ms: default_recheck_delay_ms(),
        }
    }
}

fn default_page_load_timeout_ms() -> u64 {
    30_000
}

fn default_retry_cooldown_ms() -> u64 {
    5_000
}

fn default_settle_delay_ms() -> u64 {
    3_000
}

fn default_min_content_bytes() -> usize {
    1_000
}

fn default_recheck_delay_ms() -> u64 {
    5_000
}

/// Session identity presented to the sources
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Accept-Language header
    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,

    /// Cookie header of an already authenticated session
    #[serde(default)]
    pub cookie: Option<String>,
}

fn default_accept_language() -> String {
    "fr-FR,fr;q=0.9,en;q=0.8".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving raw snapshots of pages that aborted a source
    #[serde(rename = "diagnostics-dir", default = "default_diagnostics_dir")]
    pub diagnostics_dir: String,
}

fn default_diagnostics_dir() -> String {
    "./diagnostics".to_string()
}

/// Kind of site a source points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Paged announcement board with numeric announcement IDs
    AnnouncementBoard,

    /// Query-driven classified search results
    ClassifiedSearch,
}

/// What an empty first page means for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyPagePolicy {
    /// The session is not authenticated or the layout changed: abort
    #[default]
    Abort,

    /// The query simply has no results: finish the segment
    Done,
}

/// One search term of a query-driven source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryEntry {
    pub term: String,

    /// Category tag given to every listing the query finds
    #[serde(default)]
    pub tag: Option<String>,
}

impl QueryEntry {
    /// Returns the tag, falling back to the search term itself
    pub fn tag_name(&self) -> Option<&str> {
        self.tag
            .as_deref()
            .or(Some(self.term.as_str()))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// A site to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,

    pub kind: SourceKind,

    /// Origin used to resolve relative links
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Page URL template with `{page}`, `{offset}` and `{query}` placeholders
    #[serde(rename = "search-url")]
    pub search_url: String,

    /// Listings per page, used to compute `{offset}`
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub queries: Vec<QueryEntry>,

    #[serde(rename = "empty-first-page", default)]
    pub empty_first_page: EmptyPagePolicy,

    /// Overrides `crawler.request-budget` for this source
    #[serde(rename = "request-budget", default)]
    pub request_budget: Option<u32>,

    /// Path segment required in front of detail pages
    #[serde(rename = "detail-segment", default)]
    pub detail_segment: Option<String>,

    #[serde(rename = "max-fragments-per-page", default)]
    pub max_fragments_per_page: Option<usize>,
}

fn default_page_size() -> u32 {
    40
}

impl SourceConfig {
    /// Creates a source with default settings for everything optional
    pub fn new(name: &str, kind: SourceKind, base_url: &str, search_url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            base_url: base_url.to_string(),
            search_url: search_url.to_string(),
            page_size: default_page_size(),
            queries: Vec::new(),
            empty_first_page: EmptyPagePolicy::default(),
            request_budget: None,
            detail_segment: None,
            max_fragments_per_page: None,
        }
    }

    /// Effective request budget given the crawler-wide default
    pub fn effective_budget(&self, crawler: &CrawlerConfig) -> u32 {
        self.request_budget.unwrap_or(crawler.request_budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_tag_falls_back_to_term() {
        let tagged = QueryEntry {
            term: "huile olive".to_string(),
            tag: Some("Huile".to_string()),
        };
        let bare = QueryEntry {
            term: " dattes ".to_string(),
            tag: None,
        };
        assert_eq!(tagged.tag_name(), Some("Huile"));
        assert_eq!(bare.tag_name(), Some("dattes"));
    }

    #[test]
    fn test_source_defaults_from_toml() {
        let source: SourceConfig = toml::from_str(
            r#"
name = "board"
kind = "announcement-board"
base-url = "https://example.com/"
search-url = "https://example.com/list?page={page}&num={offset}"
"#,
        )
        .unwrap();
        assert_eq!(source.kind, SourceKind::AnnouncementBoard);
        assert_eq!(source.page_size, 40);
        assert_eq!(source.empty_first_page, EmptyPagePolicy::Abort);
        assert!(source.queries.is_empty());
    }
}
