//! Keyword tables used to classify listings
//!
//! The tables are plain configuration data. They are deserialized from the
//! `[taxonomy]` section of the config (or a standalone taxonomy file) and
//! compiled once into a [`TaxonomyMatcher`] before a crawl starts.

use super::record::ExportReadiness;
use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// Maps a lowercase keyword found in listing text to the tag it produces
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProductKeyword {
    pub keyword: String,
    pub tag: String,
}

impl ProductKeyword {
    fn new(keyword: &str, tag: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            tag: tag.to_string(),
        }
    }
}

/// Classification tables (externally loadable)
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Taxonomy {
    /// Announcer roles, matched as substrings (first match in text wins)
    pub company_types: Vec<String>,

    /// Product keywords; every match contributes its tag
    pub product_keywords: Vec<ProductKeyword>,

    /// City gazetteer used when no explicit location phrase is present
    pub cities: Vec<String>,

    /// Established exporters excluded from classified-search results
    pub big_companies: Vec<String>,

    /// Literal tokens sources print instead of a date for fresh listings
    pub today_tokens: Vec<String>,

    /// Location used when nothing can be resolved
    pub default_location: String,

    /// Words that mark a listing as possibly export-ready, matched as substrings
    pub export_keywords: Vec<String>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            company_types: strings(&[
                "fabricant",
                "producteur",
                "grossiste",
                "distributeur",
                "fournisseur",
                "exportateur",
                "importateur",
            ]),
            product_keywords: vec![
                ProductKeyword::new("huile", "Huile"),
                ProductKeyword::new("olive", "Olive"),
                ProductKeyword::new("dattes", "Dattes"),
                ProductKeyword::new("miel", "Miel"),
                ProductKeyword::new("fruits", "Fruits"),
                ProductKeyword::new("legumes", "Légumes"),
                ProductKeyword::new("cereales", "Céréales"),
                ProductKeyword::new("epices", "Épices"),
                ProductKeyword::new("viande", "Viande"),
                ProductKeyword::new("poisson", "Poisson"),
                ProductKeyword::new("lait", "Produits laitiers"),
                ProductKeyword::new("fromage", "Fromage"),
                ProductKeyword::new("bio", "Bio"),
                ProductKeyword::new("agriculture", "Agriculture"),
            ],
            cities: strings(&[
                "Alger",
                "Oran",
                "Constantine",
                "Bejaia",
                "Tizi Ouzou",
                "Setif",
                "Biskra",
                "Tlemcen",
                "Batna",
                "Blida",
                "Annaba",
            ]),
            big_companies: strings(&[
                "cevital", "sonatrach", "condor", "eniem", "saidal", "biopharm", "lafarge",
                "soummam", "benamor", "hamoud", "rouiba", "sim", "ramdy", "tifra", "texalg",
            ]),
            today_tokens: strings(&["aujourd'hui", "aujourd\u{2019}hui", "today"]),
            default_location: "Algeria".to_string(),
            export_keywords: strings(&["export", "exportation", "international"]),
        }
    }
}

/// Compiled form of a [`Taxonomy`]
#[derive(Debug)]
pub struct TaxonomyMatcher {
    company_types: Option<Regex>,
    products: Vec<(String, String)>,
    cities: Option<Regex>,
    big_companies: Option<Regex>,
    today: Option<Regex>,
    export: Option<Regex>,
    default_location: String,
}

impl TaxonomyMatcher {
    /// Compiles the keyword tables into case-insensitive matchers
    pub fn new(taxonomy: &Taxonomy) -> Result<Self, ConfigError> {
        Ok(Self {
            company_types: alternation(&taxonomy.company_types, false)?,
            products: taxonomy
                .product_keywords
                .iter()
                .map(|p| (p.keyword.to_lowercase(), p.tag.clone()))
                .collect(),
            cities: alternation(&taxonomy.cities, true)?,
            big_companies: alternation(&taxonomy.big_companies, true)?,
            today: alternation(&taxonomy.today_tokens, false)?,
            export: alternation(&taxonomy.export_keywords, false)?,
            default_location: taxonomy.default_location.clone(),
        })
    }

    /// Returns the first announcer role mentioned in `text`, as written there
    pub fn company_type(&self, text: &str) -> Option<String> {
        first_match(self.company_types.as_ref(), text)
    }

    /// Returns the tags of every product keyword contained in `text`,
    /// in taxonomy order and without duplicates
    pub fn product_tags(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut tags: Vec<String> = Vec::new();
        for (keyword, tag) in &self.products {
            if lowered.contains(keyword.as_str()) && !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    /// Returns the first gazetteer city mentioned in `text`
    pub fn city(&self, text: &str) -> Option<String> {
        first_match(self.cities.as_ref(), text)
    }

    /// Returns true if `name` mentions an excluded large company
    pub fn is_big_company(&self, name: &str) -> bool {
        self.big_companies
            .as_ref()
            .map(|re| re.is_match(name))
            .unwrap_or(false)
    }

    /// Returns the "today" token as it appears in `text`
    pub fn today_token(&self, text: &str) -> Option<String> {
        first_match(self.today.as_ref(), text)
    }

    /// `Maybe` if `text` mentions any export keyword
    pub fn export_readiness(&self, text: &str) -> ExportReadiness {
        match &self.export {
            Some(re) if re.is_match(text) => ExportReadiness::Maybe,
            _ => ExportReadiness::No,
        }
    }

    pub fn default_location(&self) -> &str {
        &self.default_location
    }
}

/// Builds `(?i)(a|b|c)` over escaped keywords, optionally word-bounded
fn alternation(words: &[String], word_bounded: bool) -> Result<Option<Regex>, ConfigError> {
    let escaped: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();

    if escaped.is_empty() {
        return Ok(None);
    }

    let body = escaped.join("|");
    let pattern = if word_bounded {
        format!(r"\b({})\b", body)
    } else {
        format!("({})", body)
    };

    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| ConfigError::InvalidPattern(format!("taxonomy keyword list: {}", e)))
}

fn first_match(regex: Option<&Regex>, text: &str) -> Option<String> {
    regex
        .and_then(|re| re.find(text))
        .map(|m| m.as_str().to_string())
}
