use std::time::Duration;

use launchscout_common::{Category, CrawlConfig, ListingRecord, SiteConfig};
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{Navigation, NavigationError, Tab, WaitUntil};
use crate::dedup::Deduplicator;
use crate::extract::{extract_listings, has_page_link};

/// Why a category's page walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The listing structure never appeared within the wait.
    PageAbsent,
    /// The structure appeared but held no listings.
    EmptyContent,
    /// No link to the following page.
    NoNextPage,
    /// The per-category page cap was reached.
    PageCap,
    /// Navigation failed for another reason; only this category is affected.
    LoadFailed(String),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::PageAbsent => write!(f, "page absent"),
            StopReason::EmptyContent => write!(f, "empty content"),
            StopReason::NoNextPage => write!(f, "no next page"),
            StopReason::PageCap => write!(f, "page cap"),
            StopReason::LoadFailed(e) => write!(f, "load failed: {e}"),
        }
    }
}

/// Result of walking one category.
#[derive(Debug, Clone)]
pub struct CategoryOutcome {
    pub category: String,
    pub pages_visited: u32,
    /// Listings seen on this category's pages, duplicates included.
    pub listings_seen: usize,
    /// Listings first seen in this category, in discovery order.
    pub listings: Vec<ListingRecord>,
    pub stop: StopReason,
}

/// Walks category pages in order, extracting listings until a stop condition.
pub struct CategoryCrawler<'a> {
    site: &'a SiteConfig,
    crawl: &'a CrawlConfig,
}

impl<'a> CategoryCrawler<'a> {
    pub fn new(site: &'a SiteConfig, crawl: &'a CrawlConfig) -> Self {
        Self { site, crawl }
    }

    /// Crawl every category in order on one tab. Listings are deduplicated
    /// across the whole run; the first category to surface one keeps it.
    pub async fn crawl_all(&self, tab: &Tab, categories: &[Category]) -> Vec<CategoryOutcome> {
        let mut dedup = Deduplicator::new();
        let mut outcomes = Vec::with_capacity(categories.len());
        for (i, category) in categories.iter().enumerate() {
            info!(
                category = category.name.as_str(),
                index = i + 1,
                of = categories.len(),
                "Crawling category"
            );
            outcomes.push(self.crawl_category(tab, category, &mut dedup).await);
        }
        info!(
            categories = categories.len(),
            unique_listings = dedup.seen(),
            "Crawl finished"
        );
        outcomes
    }

    pub async fn crawl_category(
        &self,
        tab: &Tab,
        category: &Category,
        dedup: &mut Deduplicator,
    ) -> CategoryOutcome {
        let mut outcome = CategoryOutcome {
            category: category.name.clone(),
            pages_visited: 0,
            listings_seen: 0,
            listings: Vec::new(),
            stop: StopReason::PageCap,
        };
        let stop = self.walk(tab, category, dedup, &mut outcome).await;
        outcome.stop = stop;

        info!(
            category = category.name.as_str(),
            pages = outcome.pages_visited,
            new_listings = outcome.listings.len(),
            stop = %outcome.stop,
            "Category done"
        );
        outcome
    }

    async fn walk(
        &self,
        tab: &Tab,
        category: &Category,
        dedup: &mut Deduplicator,
        outcome: &mut CategoryOutcome,
    ) -> StopReason {
        for page in 1..=self.crawl.max_pages_per_category {
            let url = page_url(&category.url, page);
            let navigation = Navigation::to(&url)
                .wait_until(WaitUntil::DomContentLoaded)
                .timeout(Duration::from_millis(self.crawl.navigation_timeout_ms))
                .wait_for(
                    &self.crawl.listing_selector,
                    Duration::from_millis(self.crawl.listing_wait_ms),
                );

            let loaded = match tab.goto(navigation).await {
                Ok(loaded) => loaded,
                Err(NavigationError::SelectorTimeout { .. }) => {
                    debug!(url = url.as_str(), page, "No listing structure, ending category");
                    return StopReason::PageAbsent;
                }
                Err(e) => {
                    warn!(url = url.as_str(), page, error = %e, "Category page failed to load");
                    return StopReason::LoadFailed(e.to_string());
                }
            };
            outcome.pages_visited += 1;

            let extracted =
                extract_listings(&loaded.html, &loaded.final_url, &self.site.listing_link_pattern);
            if extracted.is_empty() {
                debug!(url = url.as_str(), page, "No listings on page, ending category");
                return StopReason::EmptyContent;
            }
            outcome.listings_seen += extracted.len();

            let fresh = dedup.admit(extracted, &category.name);
            debug!(url = url.as_str(), page, new = fresh.len(), "Page extracted");
            outcome.listings.extend(fresh);

            if !has_page_link(&loaded.html, page + 1) {
                return StopReason::NoNextPage;
            }
        }
        StopReason::PageCap
    }
}

/// Address of page `page` of a category. Page 1 is the bare category address.
pub fn page_url(category_url: &str, page: u32) -> String {
    if page <= 1 {
        return category_url.to_string();
    }
    match Url::parse(category_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("page", &page.to_string());
            url.to_string()
        }
        Err(_) => {
            let sep = if category_url.contains('?') { '&' } else { '?' };
            format!("{category_url}{sep}page={page}")
        }
    }
}

/// Listings with strictly more reviews than `threshold`, order preserved.
pub fn popular(listings: &[ListingRecord], threshold: u64) -> Vec<ListingRecord> {
    listings
        .iter()
        .filter(|l| l.is_popular(threshold))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::browser::BrowserSession;
    use crate::testing::{category_page, empty_category_page, listing, MockBrowser, Scripted};

    const REVIEWS: &str = "https://sasi.heymantle.com/category/reviews";

    fn category(name: &str, url: &str) -> Category {
        Category {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    async fn crawl(browser: Arc<MockBrowser>, categories: &[Category]) -> Vec<CategoryOutcome> {
        let site = SiteConfig::default();
        let crawl = CrawlConfig::default();
        let session = BrowserSession::new(browser, 1);
        let tab = session.open_tab().await.unwrap();
        CategoryCrawler::new(&site, &crawl).crawl_all(&tab, categories).await
    }

    #[test]
    fn page_addresses() {
        assert_eq!(page_url(REVIEWS, 1), REVIEWS);
        assert_eq!(page_url(REVIEWS, 2), format!("{REVIEWS}?page=2"));
        assert_eq!(
            page_url("https://sasi.heymantle.com/category/x?sort=top", 3),
            "https://sasi.heymantle.com/category/x?sort=top&page=3"
        );
        assert_eq!(page_url("not a url", 2), "not a url?page=2");
    }

    #[tokio::test]
    async fn follows_pages_until_no_next_link() {
        let browser = Arc::new(
            MockBrowser::new()
                .on_html(
                    REVIEWS,
                    &category_page(&[("Judge.me", "https://apps.shopify.com/judgeme", 4.9, 36512)], Some(2)),
                )
                .on_html(
                    &page_url(REVIEWS, 2),
                    &category_page(&[("Loox", "https://apps.shopify.com/loox?ref=x", 4.8, 21)], None),
                ),
        );
        let outcomes = crawl(browser.clone(), &[category("Reviews", REVIEWS)]).await;

        assert_eq!(outcomes[0].pages_visited, 2);
        assert_eq!(outcomes[0].stop, StopReason::NoNextPage);
        let urls: Vec<&str> = outcomes[0].listings.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, ["https://apps.shopify.com/judgeme", "https://apps.shopify.com/loox"]);
        assert_eq!(browser.visits(&page_url(REVIEWS, 3)), 0);
    }

    #[tokio::test]
    async fn missing_structure_and_empty_pages_end_the_category() {
        let marketing = "https://sasi.heymantle.com/category/marketing";
        let browser = Arc::new(
            MockBrowser::new()
                .on_html(REVIEWS, "<html><body><p>Nothing here</p></body></html>")
                .on_html(marketing, &empty_category_page()),
        );
        let outcomes = crawl(
            browser,
            &[category("Reviews", REVIEWS), category("Marketing", marketing)],
        )
        .await;

        assert_eq!(outcomes[0].stop, StopReason::PageAbsent);
        assert_eq!(outcomes[0].pages_visited, 0);
        assert_eq!(outcomes[1].stop, StopReason::EmptyContent);
        assert_eq!(outcomes[1].pages_visited, 1);
    }

    #[tokio::test]
    async fn load_failure_only_affects_its_category() {
        let broken = "https://sasi.heymantle.com/category/broken";
        let browser = Arc::new(
            MockBrowser::new()
                .on_error(broken, Scripted::NetworkError("net::ERR_CONNECTION_RESET".into()))
                .on_html(
                    REVIEWS,
                    &category_page(&[("Judge.me", "https://apps.shopify.com/judgeme", 4.9, 100)], None),
                ),
        );
        let outcomes = crawl(
            browser,
            &[category("Broken", broken), category("Reviews", REVIEWS)],
        )
        .await;

        assert!(matches!(outcomes[0].stop, StopReason::LoadFailed(_)));
        assert_eq!(outcomes[1].listings.len(), 1);
    }

    #[tokio::test]
    async fn first_category_keeps_shared_listing() {
        let other = "https://sasi.heymantle.com/category/photos";
        let row = [("Loox", "https://apps.shopify.com/loox?surface_type=category", 4.8, 300)];
        let browser = Arc::new(
            MockBrowser::new()
                .on_html(REVIEWS, &category_page(&row, None))
                .on_html(other, &category_page(&row, None)),
        );
        let outcomes = crawl(
            browser,
            &[category("Reviews", REVIEWS), category("Photos", other)],
        )
        .await;

        assert_eq!(outcomes[0].listings[0].category, "Reviews");
        assert!(outcomes[1].listings.is_empty());
        assert_eq!(outcomes[1].listings_seen, 1);
    }

    #[test]
    fn popularity_is_strictly_greater() {
        let listings = vec![
            listing("a", "https://apps.shopify.com/a", 20),
            listing("b", "https://apps.shopify.com/b", 21),
            listing("c", "https://apps.shopify.com/c", 500),
        ];
        let top = popular(&listings, 20);
        let names: Vec<&str> = top.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
    }
}
