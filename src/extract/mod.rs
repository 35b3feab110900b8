//! Contact extraction module
//!
//! Stateless helpers that find phone numbers, email addresses and social
//! profiles in listing text.

pub mod contacts;

pub use contacts::{extract_contacts, extract_emails, extract_phones, MAX_EMAILS, MAX_PHONES};
