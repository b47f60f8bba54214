use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A category link from the site's category index. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// ListingRecord
// ---------------------------------------------------------------------------

/// A catalog entry as read from a category listing page.
///
/// `url` is always canonical (see [`crate::canonicalize`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub name: String,
    pub url: String,
    pub rating: f64,
    pub reviews: u64,
    pub category: String,
}

impl ListingRecord {
    /// Whether this listing clears the popularity threshold (strictly more reviews).
    pub fn is_popular(&self, threshold: u64) -> bool {
        self.reviews > threshold
    }
}

// ---------------------------------------------------------------------------
// EnrichedRecord
// ---------------------------------------------------------------------------

/// A listing plus the outcome of its detail-page enrichment.
///
/// After a stage completes, exactly one of these holds:
/// - `launch_date` is set and `error` is `None` (enriched), or
/// - `launch_date` is `None` and `error` describes why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub listing: ListingRecord,
    #[serde(default)]
    pub launch_date: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EnrichedRecord {
    pub fn enriched(listing: ListingRecord, launch_date: String) -> Self {
        Self {
            listing,
            launch_date: Some(launch_date),
            error: None,
        }
    }

    pub fn failed(listing: ListingRecord, error: impl Into<String>) -> Self {
        Self {
            listing,
            launch_date: None,
            error: Some(error.into()),
        }
    }

    pub fn has_launch_date(&self) -> bool {
        self.launch_date.is_some()
    }

    /// Exactly one of {launch date, error} is present.
    pub fn is_terminal(&self) -> bool {
        self.launch_date.is_some() != self.error.is_some()
    }

    /// Overwrite the outcome fields in place, keeping the listing untouched.
    pub fn apply(&mut self, outcome: EnrichedRecord) {
        self.launch_date = outcome.launch_date;
        self.error = outcome.error;
    }
}

// ---------------------------------------------------------------------------
// ResourceType
// ---------------------------------------------------------------------------

/// Sub-resource classes a browser page may request. Matches the names
/// headless browsers use for request interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    Xhr,
    Fetch,
    Other,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Document => "document",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Image => "image",
            ResourceType::Media => "media",
            ResourceType::Font => "font",
            ResourceType::Script => "script",
            ResourceType::Xhr => "xhr",
            ResourceType::Fetch => "fetch",
            ResourceType::Other => "other",
        }
    }

    /// Resources a detail page does not need for its text content.
    pub fn non_essential() -> Vec<ResourceType> {
        vec![
            ResourceType::Image,
            ResourceType::Stylesheet,
            ResourceType::Font,
            ResourceType::Media,
            ResourceType::Other,
        ]
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
