//! Contact channel extraction
//!
//! Pulls phone numbers, email addresses and social profiles out of free text.
//! Matching is purely syntactic: nothing is dialed, resolved or validated.
//! Malformed or empty input simply produces empty results.

use crate::normalize::Contacts;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Maximum number of phone numbers kept per listing
pub const MAX_PHONES: usize = 3;

/// Maximum number of email addresses kept per listing
pub const MAX_EMAILS: usize = 2;

/// Phone patterns in priority order: international prefix, mobile, landline
static PHONE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\+213[\s.\-]?\d{3}[\s.\-]?\d{3}[\s.\-]?\d{3}",
        r"\b0[5-7]\d{2}(?:[\s.\-]?\d{2}){3}\b",
        r"\b0[2-4]\d[\s.\-]?\d{6}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("phone pattern is a valid literal"))
    .collect()
});

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b")
        .expect("email pattern is a valid literal")
});

/// Per-platform profile patterns. A pattern may capture the handle in
/// group 1, otherwise the whole match is kept.
static SOCIAL_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        (
            "facebook",
            r"(?i)\b(?:facebook\.com|fb\.com|fb\.me)/[A-Za-z0-9_.\-]+(?:/[A-Za-z0-9_.\-]+)?",
        ),
        ("instagram", r"(?i)\binstagram\.com/[A-Za-z0-9_.]+"),
        ("whatsapp", r"(?i)\bwa\.me/\+?\d+"),
        ("whatsapp", r"(?i)\bwhatsapp\b[\s:]*(\+?\d[\d\s\-]{8,}\d)"),
        ("linkedin", r"(?i)\blinkedin\.com/(?:in|company)/[A-Za-z0-9_\-%]+"),
        ("twitter", r"(?i)\b(?:twitter|x)\.com/[A-Za-z0-9_]+"),
    ]
    .iter()
    .map(|(platform, p)| {
        (
            *platform,
            Regex::new(p).expect("social pattern is a valid literal"),
        )
    })
    .collect()
});

/// Extracts every contact channel from a listing
///
/// # Arguments
///
/// * `text` - Visible text of the listing fragment
/// * `markup` - Raw markup of the fragment, searched for links the text omits
///
/// # Returns
///
/// The contacts found, with phones capped at [`MAX_PHONES`] and emails at
/// [`MAX_EMAILS`]. Each list is ordered by first occurrence.
pub fn extract_contacts(text: &str, markup: Option<&str>) -> Contacts {
    let haystack = match markup {
        Some(markup) => format!("{} {}", text, markup),
        None => text.to_string(),
    };

    let mut contacts = Contacts {
        phones: extract_phones(text),
        emails: extract_emails(&haystack),
        ..Contacts::default()
    };

    for (platform, pattern) in SOCIAL_PATTERNS.iter() {
        if contacts.social.contains_key(*platform) {
            continue;
        }
        if let Some(caps) = pattern.captures(&haystack) {
            let found = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str());
            if let Some(found) = found {
                let cleaned = found.trim_end_matches(['.', ',', '/']).trim();
                if !cleaned.is_empty() {
                    contacts
                        .social
                        .insert(platform.to_string(), cleaned.to_string());
                }
            }
        }
    }

    contacts
}

/// Returns up to [`MAX_PHONES`] phone numbers in order of appearance
///
/// Higher-priority patterns claim their span first so a number is never
/// reported twice in two shapes.
pub fn extract_phones(text: &str) -> Vec<String> {
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for pattern in PHONE_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            let overlaps = spans
                .iter()
                .any(|&(start, end)| m.start() < end && start < m.end());
            if !overlaps {
                spans.push((m.start(), m.end()));
            }
        }
    }

    spans.sort_unstable();

    let mut seen = HashSet::new();
    spans
        .into_iter()
        .map(|(start, end)| text[start..end].trim().to_string())
        .filter(|phone| seen.insert(digits_of(phone)))
        .take(MAX_PHONES)
        .collect()
}

/// Returns up to [`MAX_EMAILS`] addresses, case preserved
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    EMAIL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|email| seen.insert(email.to_lowercase()))
        .take(MAX_EMAILS)
        .collect()
}

fn digits_of(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_line() {
        let contacts = extract_contacts(
            "Contact: +213 555 123 456, email: shop@example.com, facebook.com/shoppage",
            None,
        );
        assert_eq!(contacts.phones, vec!["+213 555 123 456"]);
        assert_eq!(contacts.emails, vec!["shop@example.com"]);
        assert_eq!(
            contacts.social.get("facebook").map(String::as_str),
            Some("facebook.com/shoppage")
        );
    }

    #[test]
    fn test_phone_cap_and_order() {
        let text = "0555 12 34 56 / 0661223344 / 021 123456 / 0770 99 88 77";
        let phones = extract_phones(text);
        assert_eq!(phones, vec!["0555 12 34 56", "0661223344", "021 123456"]);
    }

    #[test]
    fn test_duplicate_phone_reported_once() {
        let phones = extract_phones("Tel 0555123456 ou 0555 12 34 56");
        assert_eq!(phones, vec!["0555123456"]);
    }

    #[test]
    fn test_international_number_is_not_split() {
        let phones = extract_phones("+213555123456");
        assert_eq!(phones, vec!["+213555123456"]);
    }

    #[test]
    fn test_email_cap_preserves_case() {
        let emails = extract_emails("A@Example.com b@example.org a@example.com c@example.net");
        assert_eq!(emails, vec!["A@Example.com", "b@example.org"]);
    }

    #[test]
    fn test_social_one_per_platform_from_markup() {
        let markup = r#"<a href="https://www.instagram.com/miel_kabyle">ig</a>
            <a href="https://instagram.com/other">ig2</a>
            <a href="https://wa.me/213555123456">wa</a>"#;
        let contacts = extract_contacts("Miel de montagne", Some(markup));
        assert_eq!(
            contacts.social.get("instagram").map(String::as_str),
            Some("instagram.com/miel_kabyle")
        );
        assert_eq!(
            contacts.social.get("whatsapp").map(String::as_str),
            Some("wa.me/213555123456")
        );
        assert!(contacts.phones.is_empty());
    }

    #[test]
    fn test_whatsapp_number_in_text() {
        let contacts = extract_contacts("WhatsApp: 0555 12 34 56", None);
        assert_eq!(
            contacts.social.get("whatsapp").map(String::as_str),
            Some("0555 12 34 56")
        );
    }

    #[test]
    fn test_garbage_input_yields_nothing() {
        assert!(extract_contacts("", None).is_empty());
        assert!(extract_contacts("<<<>>> @@ ++213", Some("<div")).is_empty());
    }
}
