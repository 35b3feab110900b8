//! Classified-search normalizer
//!
//! Search result pages are fetched once per product query. Cards carry no
//! guaranteed ID, so identity falls back from the link's `id` parameter to a
//! numeric path segment and finally to the normalized title.

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

const CARDS: &[&str] = &[
    "article",
    r#"div[class*="listing"]"#,
    r#"div[class*="card"]"#,
];

/// Titles this short are navigation crumbs, not listings
const MIN_TITLE_CHARS: usize = 4;

static TITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"h2, h3, h4, [class*="title"]"#).expect("valid literal selector")
});
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid literal selector"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid literal selector"));

fn title_of(fragment: &Fragment<'_>) -> Option<String> {
    fragment
        .select_first(&TITLE)
        .map(collapse_text)
        .filter(|title| title.chars().count() >= MIN_TITLE_CHARS)
}

fn hrefs<'a>(fragment: &Fragment<'a>) -> impl Iterator<Item = &'a str> {
    fragment
        .element()
        .select(&LINK)
        .filter_map(|a| a.value().attr("href"))
}

/// Normalizer for query-driven classified search results
pub struct ClassifiedSearch {
    name: String,
    base: Url,
    max_fragments: Option<usize>,
    splitter: SelectorChain,
    title: StrategyChain<String>,
    identity: StrategyChain<String>,
    taxonomy: Arc<TaxonomyMatcher>,
}

impl ClassifiedSearch {
    pub fn new(source: &SourceConfig, taxonomy: Arc<TaxonomyMatcher>) -> ConfigResult<Self> {
        let base = Url::parse(&source.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", source.base_url, e)))?;
        let splitter = SelectorChain::parse(CARDS)
            .map_err(|s| ConfigError::InvalidPattern(format!("selector {}", s)))?;

        let title = StrategyChain::new("title").then("heading", title_of);

        let identity = StrategyChain::new("identity_key")
            .then("link-id-param", |f| {
                hrefs(f).find_map(fields::query_param_id)
            })
            .then("link-path-id", |f| hrefs(f).find_map(fields::path_id))
            .then("normalized-title", |f| {
                title_of(f).map(|title| fields::normalize_name(&title))
            });

        Ok(Self {
            name: source.name.clone(),
            base,
            max_fragments: source.max_fragments_per_page,
            splitter,
            title,
            identity,
            taxonomy,
        })
    }
}

impl Normalizer for ClassifiedSearch {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn split<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let mut cards = self.splitter.split(document);
        if let Some(max) = self.max_fragments {
            cards.truncate(max);
        }
        cards
    }

    fn parse(&self, fragment: &Fragment<'_>, query: Option<&QueryEntry>) -> ParseOutcome {
        let Some(title) = self.title.resolve(fragment) else {
            return ParseOutcome::NotAListing;
        };

        if self.taxonomy.is_big_company(&title) {
            return ParseOutcome::Excluded(title);
        }

        let Some(key) = self.identity.resolve(fragment) else {
            return ParseOutcome::NotAListing;
        };

        let text = fragment.text();
        let mut record = ListingRecord::new(key, title, &self.name);

        record.source_url = hrefs(fragment)
            .find_map(|href| fields::resolve_url(&self.base, href, "", None))
            .unwrap_or_else(|| UNKNOWN.to_string());
        record.description = fields::description(fragment, &PARAGRAPH)
            .or_else(|| {
                Some(fields::truncate_chars(text, fields::DESCRIPTION_MAX_CHARS))
                    .filter(|d| !d.is_empty())
            })
            .unwrap_or_else(|| UNKNOWN.to_string());
        record.company_type = self
            .taxonomy
            .company_type(text)
            .unwrap_or_else(|| UNKNOWN.to_string());

        if let Some(tag) = query.and_then(QueryEntry::tag_name) {
            record.push_tag(tag);
        }
        for tag in self.taxonomy.product_tags(text) {
            record.push_tag(&tag);
        }

        record.location = fields::location(fragment, &self.taxonomy);
        record.announcement_date = fields::announcement_date(text, &self.taxonomy);
        record.export_ready = self.taxonomy.export_readiness(text);

        ParseOutcome::Listing(Box::new(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use crate::normalize::Taxonomy;

    fn search(max_fragments: Option<usize>) -> ClassifiedSearch {
        let mut source = SourceConfig::new(
            "ouedkniss",
            SourceKind::ClassifiedSearch,
            "https://www.ouedkniss.com/",
            "https://www.ouedkniss.com/s/{page}?keywords={query}",
        );
        source.max_fragments_per_page = max_fragments;
        let taxonomy = Arc::new(TaxonomyMatcher::new(&Taxonomy::default()).unwrap());
        ClassifiedSearch::new(&source, taxonomy).unwrap()
    }

    fn outcomes(search: &ClassifiedSearch, html: &str, query: Option<&QueryEntry>) -> Vec<ParseOutcome> {
        let document = Html::parse_document(html);
        search
            .split(&document)
            .into_iter()
            .map(|element| search.parse(&Fragment::new(element), query))
            .collect()
    }

    fn listing(outcome: &ParseOutcome) -> &ListingRecord {
        match outcome {
            ParseOutcome::Listing(record) => record,
            other => panic!("expected a listing, got {:?}", other),
        }
    }

    const PAGE: &str = r#"<html><body>
        <article><h3>Miel de jujubier pur</h3><a href="/annonce/miel?id=555">voir</a>
            <p>Apiculteur à Blida, miel bio. Tel 0555 12 34 56</p></article>
        <article><h3>Dattes Deglet Nour</h3><a href="/annonce/dattes-deglet-8812345">voir</a></article>
        <article><h3>Huile  d'Olive   Kabyle</h3></article>
        <article><h3>Cevital Huile</h3><a href="/annonce/x?id=1">voir</a></article>
        <article><h3>OK</h3></article>
    </body></html>"#;

    #[test]
    fn test_identity_chain() {
        let results = outcomes(&search(None), PAGE, None);
        assert_eq!(results.len(), 5);
        assert_eq!(listing(&results[0]).identity_key, "555");
        assert_eq!(listing(&results[1]).identity_key, "8812345");
        assert_eq!(listing(&results[2]).identity_key, "huile d'olive kabyle");
        assert_eq!(listing(&results[2]).source_url, UNKNOWN);
    }

    #[test]
    fn test_big_company_and_short_title() {
        let results = outcomes(&search(None), PAGE, None);
        assert_eq!(results[3], ParseOutcome::Excluded("Cevital Huile".to_string()));
        assert_eq!(results[4], ParseOutcome::NotAListing);
    }

    #[test]
    fn test_query_tag_comes_first() {
        let query = QueryEntry {
            term: "miel naturel".to_string(),
            tag: Some("Miel".to_string()),
        };
        let results = outcomes(&search(None), PAGE, Some(&query));
        let record = listing(&results[0]);
        assert_eq!(record.category_tags, vec!["Miel", "Bio"]);
        assert_eq!(record.location, "Blida");
        assert_eq!(record.source_url, "https://www.ouedkniss.com/annonce/miel?id=555");
        assert!(record.description.starts_with("Apiculteur"));
    }

    #[test]
    fn test_fragment_cap() {
        let results = outcomes(&search(Some(2)), PAGE, None);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_card_fallback() {
        let html = r#"<html><body><div class="product-card"><h2 class="title">Fromage de chèvre</h2></div></body></html>"#;
        let results = outcomes(&search(None), html, None);
        assert_eq!(results.len(), 1);
        let record = listing(&results[0]);
        assert_eq!(record.category_tags, vec!["Fromage"]);
        assert_eq!(record.description, "Fromage de chèvre");
    }
}
