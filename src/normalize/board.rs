//! Announcement-board normalizer
//!
//! Board pages list one announcement per container. Each announcement links
//! to a detail page (`esvoir.asp?id=<digits>`) whose numeric ID is the
//! listing's identity, and to the rubric it was filed under.

use super::fields;
use super::record::{ListingRecord, UNKNOWN};
use super::strategy::{collapse_text, Fragment, SelectorChain, StrategyChain};
use super::taxonomy::TaxonomyMatcher;
use super::{Normalizer, ParseOutcome};
use crate::config::{QueryEntry, SourceConfig};
use crate::{ConfigError, ConfigResult};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::Url;

/// Detail pages on the board
const DETAIL_PAGE: &str = "esvoir.asp";

/// Path segment detail pages live under
const DEFAULT_DETAIL_SEGMENT: &str = "membres";

const CONTAINERS: &[&str] = &["div.M40.PB15", r#"div[class*="M40"]"#];

static DETAIL_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="esvoir.asp?id="]"#).expect("valid literal selector"));
static RUBRIC_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="esindex.asp?dm="]"#).expect("valid literal selector"));
static LABEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.label").expect("valid literal selector"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid literal selector"));

fn detail_link<'a>(fragment: &Fragment<'a>) -> Option<ElementRef<'a>> {
    fragment.select_first(&DETAIL_LINK)
}

fn non_empty_text(element: ElementRef<'_>) -> Option<String> {
    Some(collapse_text(element)).filter(|text| !text.is_empty())
}

/// Normalizer for paged announcement boards
pub struct AnnouncementBoard {
    name: String,
    base: Url,
    detail_segment: String,
    splitter: SelectorChain,
    identity: StrategyChain<String>,
    title: StrategyChain<String>,
    company_type: StrategyChain<String>,
    announcement_type: StrategyChain<String>,
    taxonomy: Arc<TaxonomyMatcher>,
}

impl AnnouncementBoard {
    pub fn new(source: &SourceConfig, taxonomy: Arc<TaxonomyMatcher>) -> ConfigResult<Self> {
        let base = Url::parse(&source.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", source.base_url, e)))?;
        let splitter = SelectorChain::parse(CONTAINERS)
            .map_err(|s| ConfigError::InvalidPattern(format!("selector {}", s)))?;

        let identity = StrategyChain::new("identity_key").then("detail-link-id", |f| {
            detail_link(f)
                .and_then(|a| a.value().attr("href"))
                .and_then(fields::query_param_id)
        });

        // The link text is the only title a board announcement has
        let title = StrategyChain::new("title")
            .then("detail-link-text", |f| detail_link(f).and_then(non_empty_text));

        let roles = Arc::clone(&taxonomy);
        let company_type = StrategyChain::new("company_type")
            .then("role-keyword", move |f| roles.company_type(f.text()));

        let announcement_type = StrategyChain::new("announcement_type")
            .then("label", |f| f.select_first(&LABEL).and_then(non_empty_text));

        Ok(Self {
            name: source.name.clone(),
            base,
            detail_segment: source
                .detail_segment
                .clone()
                .unwrap_or_else(|| DEFAULT_DETAIL_SEGMENT.to_string()),
            splitter,
            identity,
            title,
            company_type,
            announcement_type,
            taxonomy,
        })
    }

    fn source_url(&self, fragment: &Fragment<'_>) -> Option<String> {
        let href = detail_link(fragment)?.value().attr("href")?;
        fields::resolve_url(&self.base, href, DETAIL_PAGE, Some(&self.detail_segment))
    }
}

impl Normalizer for AnnouncementBoard {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn split<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        self.splitter.split(document)
    }

    fn parse(&self, fragment: &Fragment<'_>, query: Option<&QueryEntry>) -> ParseOutcome {
        let Some(key) = self.identity.resolve(fragment) else {
            return ParseOutcome::NotAListing;
        };
        let Some(title) = self.title.resolve(fragment) else {
            return ParseOutcome::NotAListing;
        };

        let mut record = ListingRecord::new(key, title, &self.name);
        let text = fragment.text();

        record.source_url = self
            .source_url(fragment)
            .unwrap_or_else(|| UNKNOWN.to_string());
        record.description =
            fields::description(fragment, &PARAGRAPH).unwrap_or_else(|| UNKNOWN.to_string());
        record.company_type = self
            .company_type
            .resolve_or(fragment, UNKNOWN.to_string());

        if let Some(rubric) = fragment.select_first(&RUBRIC_LINK).and_then(non_empty_text) {
            record.push_tag(&rubric);
        }
        if let Some(tag) = query.and_then(QueryEntry::tag_name) {
            record.push_tag(tag);
        }
        for tag in self.taxonomy.product_tags(text) {
            record.push_tag(&tag);
        }

        record.location = fields::location(fragment, &self.taxonomy);
        record.announcement_type = self
            .announcement_type
            .resolve_or(fragment, UNKNOWN.to_string());
        record.announcement_date = fields::announcement_date(text, &self.taxonomy);
        record.export_ready = self.taxonomy.export_readiness(text);

        ParseOutcome::Listing(Box::new(record))
    }
}
