//! Field strategies shared by the source normalizers

use super::record::UNKNOWN;
use super::strategy::Fragment;
use super::taxonomy::TaxonomyMatcher;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Upper bound on stored descriptions, in characters
pub const DESCRIPTION_MAX_CHARS: usize = 500;

static QUERY_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[?&])id=(\d+)").expect("valid literal pattern"));

static PATH_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{5,})/?(?:[?#].*)?$").expect("valid literal pattern"));

static DATE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}\b").expect("valid literal pattern"));

static ANNOUNCER_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Annonceur de|Announcer from)(?:\s|&nbsp;|\x{a0})*<a[^>]*>([^<]+)</a>")
        .expect("valid literal pattern")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid literal pattern"));

/// Returns the digits of an `id=` query parameter in `href`
pub fn query_param_id(href: &str) -> Option<String> {
    let query = href.split_once('?').map(|(_, q)| q).unwrap_or(href);
    QUERY_ID
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Returns a trailing numeric path segment such as `/annonce/123456`
pub fn path_id(href: &str) -> Option<String> {
    PATH_ID
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Lowercases and collapses whitespace so names compare stably
pub fn normalize_name(name: &str) -> String {
    WHITESPACE
        .replace_all(name.trim(), " ")
        .to_lowercase()
}

/// Resolves a detail link against the source origin
///
/// Relative links that point at a detail page but lack the required path
/// segment get it prepended before joining.
///
/// # Arguments
///
/// * `base` - Source origin
/// * `href` - Link as found in the markup
/// * `detail_page` - File name identifying detail links (e.g. `esvoir.asp`)
/// * `segment` - Path segment that must precede detail pages, if any
pub fn resolve_url(base: &Url, href: &str, detail_page: &str, segment: Option<&str>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return Url::parse(href).ok().map(String::from);
    }

    let mut relative = href.to_string();
    if let Some(segment) = segment.map(|s| s.trim_matches('/')).filter(|s| !s.is_empty()) {
        let marker = format!("/{}/", segment);
        if !detail_page.is_empty() && relative.contains(detail_page) && !relative.contains(&marker) {
            relative = format!("{}{}", marker, relative.trim_start_matches('/'));
        }
    }

    base.join(&relative).ok().map(String::from)
}

/// Truncates to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Description: first paragraph of the fragment, bounded
pub fn description(fragment: &Fragment<'_>, paragraph: &scraper::Selector) -> Option<String> {
    fragment
        .select_first(paragraph)
        .map(super::strategy::collapse_text)
        .filter(|text| !text.is_empty())
        .map(|text| truncate_chars(&text, DESCRIPTION_MAX_CHARS))
}

/// Date: a "today" token, else a date-shaped substring, else `unknown`
pub fn announcement_date(text: &str, taxonomy: &TaxonomyMatcher) -> String {
    taxonomy
        .today_token(text)
        .or_else(|| DATE_SHAPE.find(text).map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Location: explicit announcer phrase, else a gazetteer city, else the
/// default region
pub fn location(fragment: &Fragment<'_>, taxonomy: &TaxonomyMatcher) -> String {
    announcer_location(fragment.html())
        .or_else(|| taxonomy.city(fragment.text()))
        .unwrap_or_else(|| taxonomy.default_location().to_string())
}

fn announcer_location(html: &str) -> Option<String> {
    ANNOUNCER_FROM
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|place| !place.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::taxonomy::Taxonomy;
    use scraper::{Html, Selector};

    fn base() -> Url {
        Url::parse("https://www.espaceagro.com/").unwrap()
    }

    #[test]
    fn test_query_param_id() {
        assert_eq!(query_param_id("esvoir.asp?id=12345"), Some("12345".to_string()));
        assert_eq!(query_param_id("page.asp?cid=9&id=77"), Some("77".to_string()));
        assert_eq!(query_param_id("page.asp?cid=9"), None);
        assert_eq!(query_param_id("esvoir.asp?id=abc"), None);
    }

    #[test]
    fn test_path_id() {
        assert_eq!(path_id("/annonce/vente-miel-987654"), Some("987654".to_string()));
        assert_eq!(path_id("/annonce/987654/?ref=x"), Some("987654".to_string()));
        assert_eq!(path_id("/annonce/miel"), None);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Miel   de\tKabylie "), "miel de kabylie");
    }

    #[test]
    fn test_resolve_url_inserts_segment() {
        let url = resolve_url(&base(), "esvoir.asp?id=1", "esvoir.asp", Some("membres"));
        assert_eq!(url.as_deref(), Some("https://www.espaceagro.com/membres/esvoir.asp?id=1"));

        let url = resolve_url(&base(), "/membres/esvoir.asp?id=1", "esvoir.asp", Some("membres"));
        assert_eq!(url.as_deref(), Some("https://www.espaceagro.com/membres/esvoir.asp?id=1"));
    }

    #[test]
    fn test_resolve_url_keeps_absolute_and_unrelated_links() {
        let url = resolve_url(&base(), "https://other.example/x", "esvoir.asp", Some("membres"));
        assert_eq!(url.as_deref(), Some("https://other.example/x"));

        let url = resolve_url(&base(), "esindex.asp?dm=3", "esvoir.asp", Some("membres"));
        assert_eq!(url.as_deref(), Some("https://www.espaceagro.com/esindex.asp?dm=3"));

        assert_eq!(resolve_url(&base(), "  ", "esvoir.asp", None), None);
    }

    #[test]
    fn test_truncate_chars_on_boundary() {
        assert_eq!(truncate_chars("éééé", 2), "éé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_description_is_bounded() {
        let long = "x".repeat(800);
        let html = format!("<div><p>{}</p><p>second</p></div>", long);
        let document = Html::parse_fragment(&html);
        let div = Selector::parse("div").unwrap();
        let fragment = Fragment::new(document.select(&div).next().unwrap());
        let p = Selector::parse("p").unwrap();
        let text = description(&fragment, &p).unwrap();
        assert_eq!(text.chars().count(), DESCRIPTION_MAX_CHARS);
    }

    #[test]
    fn test_announcement_date() {
        let taxonomy = TaxonomyMatcher::new(&Taxonomy::default()).unwrap();
        assert_eq!(announcement_date("Publié Aujourd'hui", &taxonomy), "Aujourd'hui");
        assert_eq!(announcement_date("le 12/03/2024 à Oran", &taxonomy), "12/03/2024");
        assert_eq!(announcement_date("pas de date", &taxonomy), UNKNOWN);
    }

    #[test]
    fn test_location_chain() {
        let taxonomy = TaxonomyMatcher::new(&Taxonomy::default()).unwrap();
        let div = Selector::parse("div").unwrap();

        let document =
            Html::parse_fragment(r#"<div>Annonceur de &nbsp;<a href="/p">Tlemcen</a> à Oran</div>"#);
        let fragment = Fragment::new(document.select(&div).next().unwrap());
        assert_eq!(location(&fragment, &taxonomy), "Tlemcen");

        let document = Html::parse_fragment("<div>Livraison depuis Oran</div>");
        let fragment = Fragment::new(document.select(&div).next().unwrap());
        assert_eq!(location(&fragment, &taxonomy), "Oran");

        let document = Html::parse_fragment("<div>Sans ville</div>");
        let fragment = Fragment::new(document.select(&div).next().unwrap());
        assert_eq!(location(&fragment, &taxonomy), "Algeria");
    }
}
