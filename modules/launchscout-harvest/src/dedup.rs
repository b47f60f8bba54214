use std::collections::HashSet;

use launchscout_common::{canonicalize, ListingRecord};

use crate::extract::ExtractedListing;

/// Canonical identifiers seen so far in a crawl, across pages and categories.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a canonical identifier. Returns `true` the first time it is seen.
    pub fn insert(&mut self, canonical: &str) -> bool {
        if self.seen.contains(canonical) {
            return false;
        }
        self.seen.insert(canonical.to_string())
    }

    /// Distinct listings seen so far.
    pub fn seen(&self) -> usize {
        self.seen.len()
    }

    /// Canonicalize freshly extracted listings and keep only unseen ones,
    /// tagged with the category they were first found in.
    pub fn admit(&mut self, extracted: Vec<ExtractedListing>, category: &str) -> Vec<ListingRecord> {
        extracted
            .into_iter()
            .filter_map(|listing| {
                let url = canonicalize(&listing.url);
                self.insert(&url).then(|| ListingRecord {
                    name: listing.name,
                    url,
                    rating: listing.rating,
                    reviews: listing.reviews,
                    category: category.to_string(),
                })
            })
            .collect()
    }
}
