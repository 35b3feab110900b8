//! Ordered fallback chains for field resolution
//!
//! Every site quirk is expressed as a named strategy. A chain tries its
//! strategies in order and the first one that produces a value wins.

use scraper::{ElementRef, Html, Selector};
use std::fmt;

/// One listing-sized piece of a page
pub struct Fragment<'a> {
    element: ElementRef<'a>,
    text: String,
    html: String,
}

impl<'a> Fragment<'a> {
    pub fn new(element: ElementRef<'a>) -> Self {
        let text = collapse_text(element);
        let html = element.html();
        Self {
            element,
            text,
            html,
        }
    }

    pub fn element(&self) -> ElementRef<'a> {
        self.element
    }

    /// Visible text with whitespace runs collapsed to single spaces
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Outer markup of the fragment
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Returns the first descendant matching `selector`
    pub fn select_first(&self, selector: &Selector) -> Option<ElementRef<'a>> {
        self.element.select(selector).next()
    }
}

impl fmt::Debug for Fragment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("tag", &self.element.value().name())
            .field("text", &self.text)
            .finish()
    }
}

/// Joins the words of every text node under an element with single spaces
pub fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

type StrategyFn<T> = Box<dyn Fn(&Fragment<'_>) -> Option<T> + Send + Sync>;

/// An ordered list of named strategies resolving one field
pub struct StrategyChain<T> {
    field: &'static str,
    strategies: Vec<(&'static str, StrategyFn<T>)>,
}

impl<T> StrategyChain<T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    /// Appends a strategy to the end of the chain
    pub fn then<F>(mut self, name: &'static str, strategy: F) -> Self
    where
        F: Fn(&Fragment<'_>) -> Option<T> + Send + Sync + 'static,
    {
        self.strategies.push((name, Box::new(strategy)));
        self
    }

    /// Runs the strategies in order and returns the first value produced
    pub fn resolve(&self, fragment: &Fragment<'_>) -> Option<T> {
        for (name, strategy) in &self.strategies {
            if let Some(value) = strategy(fragment) {
                tracing::trace!(field = self.field, strategy = name, "Field resolved");
                return Some(value);
            }
        }
        None
    }

    /// Like [`resolve`](Self::resolve) but falls back to `default`
    pub fn resolve_or(&self, fragment: &Fragment<'_>, default: T) -> T {
        self.resolve(fragment).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Fragment splitter: the first selector that matches anything wins
#[derive(Debug, Clone)]
pub struct SelectorChain {
    selectors: Vec<Selector>,
}

impl SelectorChain {
    /// Parses each CSS selector in order
    ///
    /// Returns the offending selector text if one does not parse.
    pub fn parse(selectors: &[&str]) -> Result<Self, String> {
        let selectors = selectors
            .iter()
            .map(|s| Selector::parse(s).map_err(|_| s.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }

    pub fn split<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for selector in &self.selectors {
            let found: Vec<ElementRef<'a>> = document.select(selector).collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }
}
