//! Record normalization module
//!
//! Turns one listing fragment of a fetched page into a canonical
//! [`ListingRecord`], or reports that the fragment is not a listing.
//! Each source kind has its own normalizer built from strategy chains.

pub mod board;
pub mod classified;
pub mod fields;
pub mod record;
pub mod strategy;
pub mod taxonomy;

pub use board::AnnouncementBoard;
pub use classified::ClassifiedSearch;
pub use record::{Contacts, ExportReadiness, ListingRecord, UNKNOWN};
pub use strategy::{Fragment, SelectorChain, StrategyChain};
pub use taxonomy::{ProductKeyword, Taxonomy, TaxonomyMatcher};

use crate::config::{QueryEntry, SourceConfig, SourceKind};
use crate::ConfigResult;
use scraper::{ElementRef, Html};
use std::sync::Arc;

/// Outcome of normalizing a single fragment
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The fragment is a listing
    Listing(Box<ListingRecord>),

    /// The fragment carries no resolvable identity or title
    NotAListing,

    /// A listing deliberately left out (e.g. an excluded company)
    Excluded(String),
}

/// Source-specific fragment splitting and record normalization
pub trait Normalizer: Send + Sync {
    /// Name of the source this normalizer serves
    fn source_name(&self) -> &str;

    /// Splits a page into listing-sized fragments
    fn split<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>>;

    /// Normalizes one fragment
    ///
    /// `query` is the search entry that produced the page, if the source is
    /// query-driven. Never fails: anything unusable is `NotAListing`.
    fn parse(&self, fragment: &Fragment<'_>, query: Option<&QueryEntry>) -> ParseOutcome;
}

/// Builds the normalizer matching a source's kind
pub fn build_normalizer(
    source: &SourceConfig,
    taxonomy: Arc<TaxonomyMatcher>,
) -> ConfigResult<Box<dyn Normalizer>> {
    Ok(match source.kind {
        SourceKind::AnnouncementBoard => Box::new(AnnouncementBoard::new(source, taxonomy)?),
        SourceKind::ClassifiedSearch => Box::new(ClassifiedSearch::new(source, taxonomy)?),
    })
}
