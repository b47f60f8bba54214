use std::time::Duration;

use launchscout_common::{Category, CrawlConfig, SiteConfig};
use tracing::{debug, info, warn};

use crate::browser::{LoadedPage, Navigation, NavigationError, Tab, WaitUntil};
use crate::extract::extract_categories;

/// Reads the category index page into a deduplicated category list.
pub struct CategoryDiscoverer<'a> {
    site: &'a SiteConfig,
    crawl: &'a CrawlConfig,
}

impl<'a> CategoryDiscoverer<'a> {
    pub fn new(site: &'a SiteConfig, crawl: &'a CrawlConfig) -> Self {
        Self { site, crawl }
    }

    /// Load the index and extract categories. A missing `a` element within the
    /// wait is tolerated (the page is re-read without waiting); any other
    /// navigation failure is returned, since nothing can be crawled without it.
    pub async fn discover(&self, tab: &Tab) -> Result<Vec<Category>, NavigationError> {
        let url = self.site.categories_url.as_str();
        info!(url, "Loading category index");

        let page = self.load_index(tab, url).await?;
        let categories =
            extract_categories(&page.html, &page.final_url, &self.site.category_link_marker);

        info!(count = categories.len(), "Discovered categories");
        if categories.is_empty() {
            let sample: Vec<String> = extract_categories(&page.html, &page.final_url, "")
                .into_iter()
                .take(5)
                .map(|c| c.url)
                .collect();
            warn!(?sample, "No category links found on index page");
        }
        for category in &categories {
            debug!(name = category.name.as_str(), url = category.url.as_str(), "Category");
        }
        Ok(categories)
    }

    async fn load_index(&self, tab: &Tab, url: &str) -> Result<LoadedPage, NavigationError> {
        let navigation = Navigation::to(url)
            .wait_until(WaitUntil::NetworkIdle)
            .timeout(Duration::from_millis(self.crawl.navigation_timeout_ms));

        match tab
            .goto(
                navigation
                    .clone()
                    .wait_for("a", Duration::from_millis(self.crawl.index_wait_ms)),
            )
            .await
        {
            Err(NavigationError::SelectorTimeout { .. }) => {
                warn!(url, "Timeout waiting for links, reading index as loaded");
                tab.goto(navigation).await
            }
            other => other,
        }
    }
}
