//! Canonical listing record produced by the normalizers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder stored for fields the page did not provide
pub const UNKNOWN: &str = "unknown";

/// Contact channels found inside a listing fragment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contacts {
    /// Phone numbers in order of first occurrence (at most 3)
    pub phones: Vec<String>,

    /// Email addresses in order of first occurrence (at most 2)
    pub emails: Vec<String>,

    /// Platform name to profile URL or handle (one per platform)
    pub social: BTreeMap<String, String>,
}

impl Contacts {
    /// Returns true if no channel of any kind was found
    pub fn is_empty(&self) -> bool {
        self.phones.is_empty() && self.emails.is_empty() && self.social.is_empty()
    }
}

/// Whether a listing mentions selling abroad
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportReadiness {
    /// The text mentions export or international trade
    Maybe,

    #[default]
    No,
}

impl ExportReadiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maybe => "Maybe",
            Self::No => "No",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "Maybe" => Some(Self::Maybe),
            "No" => Some(Self::No),
            _ => None,
        }
    }
}

/// One business listing, keyed by its natural identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Source-stable natural key (source-assigned ID or normalized name)
    pub identity_key: String,

    pub title: String,

    /// First paragraph of the listing, bounded in length
    pub description: String,

    /// Role of the announcer (producer, wholesaler, ...) when recognized
    pub company_type: String,

    /// Category and product tags, discovery order, no duplicates
    pub category_tags: Vec<String>,

    pub location: String,

    pub contacts: Contacts,

    pub source_url: String,

    pub source_name: String,

    pub discovered_at: DateTime<Utc>,

    pub announcement_type: String,

    /// Free-text date as displayed by the source ("Aujourd'hui", "12/03/2024")
    pub announcement_date: String,

    pub export_ready: ExportReadiness,
}

impl ListingRecord {
    /// Creates a record with every optional field set to its default
    pub fn new(identity_key: impl Into<String>, title: impl Into<String>, source_name: &str) -> Self {
        Self {
            identity_key: identity_key.into(),
            title: title.into(),
            description: UNKNOWN.to_string(),
            company_type: UNKNOWN.to_string(),
            category_tags: Vec::new(),
            location: UNKNOWN.to_string(),
            contacts: Contacts::default(),
            source_url: UNKNOWN.to_string(),
            source_name: source_name.to_string(),
            discovered_at: Utc::now(),
            announcement_type: UNKNOWN.to_string(),
            announcement_date: UNKNOWN.to_string(),
            export_ready: ExportReadiness::No,
        }
    }

    /// Appends a tag unless an equal tag (ignoring case) is already present
    pub fn push_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if tag.is_empty() {
            return;
        }
        if !self
            .category_tags
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(tag))
        {
            self.category_tags.push(tag.to_string());
        }
    }
}
