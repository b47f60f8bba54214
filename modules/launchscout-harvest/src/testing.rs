//! Test doubles and page fixtures.
//!
//! `MockBrowser` serves scripted responses per address and records every
//! navigation it receives, so tests can assert on what was requested as well
//! as on what the pipeline produced.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use launchscout_common::ListingRecord;
use scraper::{Html, Selector};

use crate::browser::{Browser, LoadedPage, Navigation, NavigationError};

// ---------------------------------------------------------------------------
// MockBrowser
// ---------------------------------------------------------------------------

/// One scripted reaction to a navigation.
#[derive(Debug, Clone)]
pub enum Scripted {
    Page { status: Option<u16>, html: String },
    NavigationTimeout,
    NetworkError(String),
    Fatal(String),
}

impl Scripted {
    pub fn html(html: &str) -> Self {
        Scripted::Page {
            status: Some(200),
            html: html.to_string(),
        }
    }

    pub fn status(status: u16, html: &str) -> Self {
        Scripted::Page {
            status: Some(status),
            html: html.to_string(),
        }
    }
}

/// Browser that answers from a script instead of the network.
///
/// Each address holds a queue of reactions; every navigation consumes the
/// front one, and the last one repeats forever. Addresses without a script
/// fail with a non-retriable error. Selector waits are honored against the
/// scripted HTML.
#[derive(Default)]
pub struct MockBrowser {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    navigations: Mutex<Vec<Navigation>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_html(self, url: &str, html: &str) -> Self {
        self.on_sequence(url, vec![Scripted::html(html)])
    }

    pub fn on_status(self, url: &str, status: u16, html: &str) -> Self {
        self.on_sequence(url, vec![Scripted::status(status, html)])
    }

    pub fn on_error(self, url: &str, error: Scripted) -> Self {
        self.on_sequence(url, vec![error])
    }

    pub fn on_sequence(self, url: &str, script: Vec<Scripted>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), script.into());
        self
    }

    /// Every navigation received, in order.
    pub fn navigations(&self) -> Vec<Navigation> {
        self.navigations.lock().unwrap().clone()
    }

    /// How many times `url` was navigated to.
    pub fn visits(&self, url: &str) -> usize {
        self.navigations
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.url == url)
            .count()
    }

    fn next_reaction(&self, url: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn navigate(&self, navigation: &Navigation) -> Result<LoadedPage, NavigationError> {
        self.navigations.lock().unwrap().push(navigation.clone());

        let Some(reaction) = self.next_reaction(&navigation.url) else {
            return Err(NavigationError::Other(format!(
                "MockBrowser: no script for {}",
                navigation.url
            )));
        };

        match reaction {
            Scripted::Page { status, html } => {
                if let Some(wait) = &navigation.wait_for {
                    let selector = Selector::parse(&wait.selector).map_err(|e| {
                        NavigationError::Other(format!("Invalid selector: {e:?}"))
                    })?;
                    if Html::parse_document(&html).select(&selector).next().is_none() {
                        return Err(NavigationError::SelectorTimeout {
                            selector: wait.selector.clone(),
                        });
                    }
                }
                Ok(LoadedPage::new(&navigation.url, status, html))
            }
            Scripted::NavigationTimeout => Err(NavigationError::NavigationTimeout(format!(
                "Navigation timeout of {} ms exceeded",
                navigation.timeout.as_millis()
            ))),
            Scripted::NetworkError(msg) => Err(NavigationError::Network(msg)),
            Scripted::Fatal(msg) => Err(NavigationError::Other(msg)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Category index page linking to each `(name, href)`.
pub fn index_page(categories: &[(&str, &str)]) -> String {
    let links: String = categories
        .iter()
        .map(|(name, href)| format!(r#"<li><a href="{href}">{name}</a></li>"#))
        .collect();
    format!(
        r#"<html><head><title>Categories</title></head><body>
        <a href="/">Home</a><ul>{links}</ul></body></html>"#
    )
}

/// Table-layout category page. Rows are `(name, href, rating, reviews)`;
/// `next_page` adds a pagination link.
pub fn category_page(rows: &[(&str, &str, f64, u64)], next_page: Option<u32>) -> String {
    let body: String = rows
        .iter()
        .enumerate()
        .map(|(i, (name, href, rating, reviews))| {
            format!(
                r#"<tr><td>{}</td><td><a href="{href}">{name}</a></td><td>{rating}</td><td>{reviews}</td></tr>"#,
                i + 1
            )
        })
        .collect();
    let pager = next_page
        .map(|n| format!(r#"<nav><a href="?page={n}">Next</a></nav>"#))
        .unwrap_or_default();
    format!(
        r#"<html><body><table><thead><tr><th>#</th><th>App</th><th>Rating</th><th>Reviews</th></tr></thead>
        <tbody>{body}</tbody></table>{pager}</body></html>"#
    )
}

/// Category page with the listing table but no rows.
pub fn empty_category_page() -> String {
    r#"<html><body><div class="grid"></div></body></html>"#.to_string()
}

/// Listing detail page showing a launch date.
pub fn detail_page(launch_date: &str) -> String {
    format!(
        r#"<html><head><title>App details</title></head><body>
        <h1>App</h1><div class="meta"><p>Launched</p><p>{launch_date}</p></div></body></html>"#
    )
}

/// Detail page without any launch date.
pub fn undated_detail_page() -> String {
    r#"<html><head><title>App details</title></head><body><h1>App</h1><p>Pricing: free</p></body></html>"#
        .to_string()
}

pub fn rate_limited_page() -> String {
    r#"<html><head><title>Shopify App Store</title></head><body><p>Too many requests. Please try again later.</p></body></html>"#
        .to_string()
}

pub fn not_found_page() -> String {
    r#"<html><head><title>404 Not Found</title></head><body><p>This app is no longer available.</p></body></html>"#
        .to_string()
}

pub fn listing(name: &str, url: &str, reviews: u64) -> ListingRecord {
    ListingRecord {
        name: name.to_string(),
        url: url.to_string(),
        rating: 4.5,
        reviews,
        category: "Reviews".to_string(),
    }
}
