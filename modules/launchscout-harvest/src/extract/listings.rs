use std::collections::HashSet;
use std::sync::LazyLock;

use launchscout_common::Category;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::element_text;

static STAR_RATING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d(\.\d)?)\s*★").expect("valid regex"));
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("valid regex"));

/// A listing as it appears on one category page, before dedup.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedListing {
    pub name: String,
    /// Absolute, not yet canonicalized.
    pub url: String,
    pub rating: f64,
    pub reviews: u64,
}

/// Resolve every `a[href]` on the page, yielding (element, absolute address).
fn anchors<'a>(document: &'a Html, base: Option<&Url>) -> Vec<(ElementRef<'a>, String)> {
    let selector = Selector::parse("a[href]").expect("valid selector");
    document
        .select(&selector)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                return None;
            }
            let resolved = match base {
                Some(b) => b.join(href).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string()),
                None => href.to_string(),
            };
            Some((a, resolved))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Category links on the index page: anchors whose address contains `marker`.
/// Deduplicated by address (first occurrence wins); unnamed links are skipped.
pub fn extract_categories(html: &str, page_url: &str, marker: &str) -> Vec<Category> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let mut seen = HashSet::new();
    let mut categories = Vec::new();
    for (anchor, url) in anchors(&document, base.as_ref()) {
        if !url.contains(marker) {
            continue;
        }
        let name = element_text(&anchor);
        if name.is_empty() {
            continue;
        }
        if seen.insert(url.clone()) {
            categories.push(Category { name, url });
        }
    }
    categories
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Extract every listing link on a category page.
///
/// Ratings and review counts come from the link's row:
/// - table rows: with at least three cells, the last cell is the review count
///   and the second-last the rating; shorter rows yield zeros.
/// - anything else: a `4.9 ★` star pattern for the rating and the last number
///   in the row text for the review count.
pub fn extract_listings(html: &str, page_url: &str, link_pattern: &str) -> Vec<ExtractedListing> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    anchors(&document, base.as_ref())
        .into_iter()
        .filter(|(_, url)| url.contains(link_pattern))
        .map(|(anchor, url)| {
            let name = element_text(&anchor);
            let name = if name.is_empty() {
                "Unknown App".to_string()
            } else {
                name
            };
            let (rating, reviews) = match closest(anchor, |el| el.value().name() == "tr") {
                Some(row) => table_row_metrics(&row),
                None => text_row_metrics(&row_container(anchor)),
            };
            ExtractedListing {
                name,
                url,
                rating,
                reviews,
            }
        })
        .collect()
}

fn table_row_metrics(row: &ElementRef) -> (f64, u64) {
    let cell = Selector::parse("td").expect("valid selector");
    let cells: Vec<String> = row.select(&cell).map(|td| element_text(&td)).collect();
    if cells.len() < 3 {
        return (0.0, 0);
    }
    let reviews = leading_int(&cells[cells.len() - 1].replace(',', "")).unwrap_or(0);
    let rating = leading_float(&cells[cells.len() - 2]).unwrap_or(0.0);
    (rating, reviews)
}

fn text_row_metrics(row: &ElementRef) -> (f64, u64) {
    let text = element_text(row);
    let rating = STAR_RATING
        .captures(&text)
        .and_then(|c| c[1].parse::<f64>().ok())
        .unwrap_or(0.0);
    let reviews = NUMBER
        .find_iter(&text)
        .last()
        .and_then(|m| m.as_str().replace(',', "").parse::<u64>().ok())
        .unwrap_or(0);
    (rating, reviews)
}

/// Row-like container of a non-table listing link: the grid cell holding it,
/// or failing that its grandparent.
fn row_container(anchor: ElementRef) -> ElementRef {
    if let Some(cell) = closest(anchor, |el| {
        el.value().name() == "div"
            && el
                .parent()
                .and_then(ElementRef::wrap)
                .is_some_and(|p| p.value().classes().any(|c| c == "grid"))
    }) {
        return cell;
    }
    anchor
        .parent()
        .and_then(|p| p.parent())
        .and_then(ElementRef::wrap)
        .unwrap_or(anchor)
}

/// Nearest ancestor-or-self matching `pred`.
fn closest<'a>(element: ElementRef<'a>, pred: impl Fn(&ElementRef<'a>) -> bool) -> Option<ElementRef<'a>> {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|el| pred(el))
}

/// Leading unsigned integer of a string (`"1234 reviews"` → 1234).
fn leading_int(s: &str) -> Option<u64> {
    let digits: String = s.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Leading decimal number of a string (`"4.9 ★"` → 4.9).
fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() {
            end = i + 1;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
        } else {
            break;
        }
    }
    s[..end].parse().ok()
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Whether any link on the page advertises `page=<page>`.
pub fn has_page_link(html: &str, page: u32) -> bool {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("valid selector");
    let needle = format!("page={page}");

    document.select(&selector).any(|a| {
        let Some(href) = a.value().attr("href") else {
            return false;
        };
        href.match_indices(&needle).any(|(i, m)| {
            let preceded_ok = href[..i]
                .chars()
                .last()
                .map_or(true, |c| c == '?' || c == '&' || c == ';' || c == '/');
            let followed_ok = href[i + m.len()..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_ascii_digit());
            preceded_ok && followed_ok
        })
    })
}
