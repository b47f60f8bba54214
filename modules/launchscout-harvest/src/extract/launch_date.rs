use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::visible_text;
use crate::browser::LoadedPage;

/// "March 3, 2025"
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-z]+ \d{1,2}, \d{4}").expect("valid regex"));
static DATE_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z]+ \d{1,2}, \d{4}$").expect("valid regex"));

/// Pulls the launch date out of a loaded detail page.
pub trait LaunchDateExtractor: Send + Sync {
    fn extract(&self, page: &LoadedPage) -> Option<String>;
}

/// Finds a date next to a label element ("Launched"), falling back to a
/// label-anchored search over the page text.
pub struct LabeledDateExtractor {
    label: String,
    relaxed: Regex,
}

impl LabeledDateExtractor {
    pub fn new(label: &str) -> Self {
        let relaxed = Regex::new(&format!(
            r"{}\s*([A-Z][a-z]+ \d{{1,2}}, \d{{4}})",
            regex::escape(label)
        ))
        .expect("valid regex");
        Self {
            label: label.to_string(),
            relaxed,
        }
    }

    /// Tier 1: an element consisting solely of the label text, then either its
    /// next element sibling (date anywhere in it) or a later sibling in the same
    /// grid row (date is the whole cell).
    fn from_label_element(&self, document: &Html) -> Option<String> {
        let all = Selector::parse("body *").expect("valid selector");
        document
            .select(&all)
            .filter(|el| el.children().count() == 1 && text_content(el) == self.label)
            .find_map(|label| {
                if let Some(sibling) = label.next_siblings().find_map(ElementRef::wrap) {
                    if let Some(m) = DATE.find(&text_content(&sibling)) {
                        return Some(m.as_str().to_string());
                    }
                }
                label
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .map(|cell| text_content(&cell))
                    .find(|text| DATE_EXACT.is_match(text))
            })
    }

    /// Tier 2: label followed by a date anywhere in the visible text.
    fn from_text(&self, text: &str) -> Option<String> {
        self.relaxed.captures(text).map(|c| c[1].to_string())
    }
}

impl Default for LabeledDateExtractor {
    fn default() -> Self {
        Self::new("Launched")
    }
}

impl LaunchDateExtractor for LabeledDateExtractor {
    fn extract(&self, page: &LoadedPage) -> Option<String> {
        let document = page.document();
        self.from_label_element(&document)
            .or_else(|| self.from_text(&visible_text(&document)))
    }
}

/// Concatenated text of an element, whitespace runs collapsed.
fn text_content(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
