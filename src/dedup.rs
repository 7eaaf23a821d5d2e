use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::models::JobListing;

/// Deduplication key derived from the stable subset of listing fields.
/// Two listings with the same fingerprint are treated as the same posting
/// regardless of which source produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Key on normalized title, company and location. URLs differ per
    /// source for the same posting, so they stay out of the key; optional
    /// fields stay out so their absence cannot change the result.
    pub fn of(listing: &JobListing) -> Self {
        Self::from_fields(&listing.title, &listing.company, &listing.location)
    }

    pub fn from_fields(title: &str, company: &str, location: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(fold(title).as_bytes());
        hasher.update(b"|");
        hasher.update(fold(company).as_bytes());
        hasher.update(b"|");
        hasher.update(fold(location).as_bytes());
        Self(hasher.finalize().into())
    }

    /// Hex form, for logs.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Lowercase and collapse runs of whitespace so cosmetic variance between
/// sources does not split fingerprints.
fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Run-scoped duplicate filter. First admission of a fingerprint wins;
/// every later listing with the same fingerprint is rejected.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<Fingerprint>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload fingerprints (from a prior run's export) so those listings
    /// are suppressed without counting as this run's accepts.
    pub fn preload<I: IntoIterator<Item = Fingerprint>>(&mut self, fingerprints: I) {
        self.seen.extend(fingerprints);
    }

    /// Returns true if the listing is new and was admitted, false if it
    /// duplicates an already-admitted listing.
    pub fn admit(&mut self, listing: &JobListing) -> bool {
        self.seen.insert(Fingerprint::of(listing))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
