//! Page descriptors for paginated sources

use crate::config::{QueryEntry, SourceConfig};
use crate::{ConfigError, ConfigResult};
use url::form_urlencoded;
use url::Url;

/// One page the scheduler asks the fetcher for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    pub source_name: String,
    pub query: Option<QueryEntry>,
    /// 1-based page number within the query segment
    pub page_number: u32,
    pub url: String,
}

impl PageDescriptor {
    /// Builds the descriptor for `page_number` of a source segment
    ///
    /// `{page}` is the page number, `{offset}` the index of the first listing
    /// on the page and `{query}` the form-encoded search term.
    pub fn new(
        source: &SourceConfig,
        query: Option<&QueryEntry>,
        page_number: u32,
    ) -> ConfigResult<Self> {
        let offset = u64::from(page_number.saturating_sub(1)) * u64::from(source.page_size);
        let term = query
            .map(|q| form_urlencoded::byte_serialize(q.term.trim().as_bytes()).collect::<String>())
            .unwrap_or_default();

        let raw = source
            .search_url
            .replace("{page}", &page_number.to_string())
            .replace("{offset}", &offset.to_string())
            .replace("{query}", &term);

        let url = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw, e)))?;

        Ok(Self {
            source_name: source.name.clone(),
            query: query.cloned(),
            page_number,
            url: url.into(),
        })
    }
}

/// The query segments a source is crawled in
///
/// Sources without queries have a single unnamed segment.
pub fn segments(source: &SourceConfig) -> Vec<Option<QueryEntry>> {
    if source.queries.is_empty() {
        vec![None]
    } else {
        source.queries.iter().cloned().map(Some).collect()
    }
}
