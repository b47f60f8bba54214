use std::sync::Arc;

use launchscout_common::ResourceType;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use super::{Browser, LoadedPage, Navigation, NavigationError};

/// One browser shared by every worker. Workers take an isolated [`Tab`] for
/// the duration of one unit of work; the session bounds how many are open.
pub struct BrowserSession {
    browser: Arc<dyn Browser>,
    tabs: Arc<Semaphore>,
    max_tabs: usize,
}

impl BrowserSession {
    pub fn new(browser: Arc<dyn Browser>, max_tabs: usize) -> Self {
        let max_tabs = max_tabs.max(1);
        Self {
            browser,
            tabs: Arc::new(Semaphore::new(max_tabs)),
            max_tabs,
        }
    }

    /// Open an isolated tab, waiting if `max_tabs` are already open.
    /// The tab is released when dropped, on every exit path.
    pub async fn open_tab(&self) -> Result<Tab, NavigationError> {
        let permit = self
            .tabs
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| NavigationError::Other("Browser session closed".to_string()))?;

        debug!(browser = self.browser.name(), open = self.open_tabs(), "Opened tab");

        Ok(Tab {
            browser: self.browser.clone(),
            blocked: Vec::new(),
            _permit: permit,
        })
    }

    /// Tabs currently held by workers.
    pub fn open_tabs(&self) -> usize {
        self.max_tabs - self.tabs.available_permits()
    }

    pub fn browser_name(&self) -> &str {
        self.browser.name()
    }
}

/// An isolated page handle. Holds a session slot until dropped.
pub struct Tab {
    browser: Arc<dyn Browser>,
    blocked: Vec<ResourceType>,
    _permit: OwnedSemaphorePermit,
}

impl Tab {
    /// Abort requests for these resource types on every later navigation.
    pub fn block_resources(&mut self, resources: &[ResourceType]) {
        for resource in resources {
            if !self.blocked.contains(resource) {
                self.blocked.push(*resource);
            }
        }
    }

    pub async fn goto(&self, mut navigation: Navigation) -> Result<LoadedPage, NavigationError> {
        for resource in &self.blocked {
            if !navigation.blocked.contains(resource) {
                navigation.blocked.push(*resource);
            }
        }
        self.browser.navigate(&navigation).await
    }

    /// Close the tab. Dropping it has the same effect.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBrowser;

    #[tokio::test]
    async fn tabs_are_released_on_drop() {
        let session = BrowserSession::new(Arc::new(MockBrowser::new()), 2);
        let a = session.open_tab().await.unwrap();
        let b = session.open_tab().await.unwrap();
        assert_eq!(session.open_tabs(), 2);
        drop(a);
        assert_eq!(session.open_tabs(), 1);
        b.close();
        assert_eq!(session.open_tabs(), 0);
    }

    #[tokio::test]
    async fn blocked_resources_are_applied_to_navigations() {
        let browser = Arc::new(MockBrowser::new().on_html("https://apps.shopify.com/a", "<p>ok</p>"));
        let session = BrowserSession::new(browser.clone(), 1);
        let mut tab = session.open_tab().await.unwrap();
        tab.block_resources(&[ResourceType::Image, ResourceType::Font]);
        tab.block_resources(&[ResourceType::Image]);

        tab.goto(Navigation::to("https://apps.shopify.com/a")).await.unwrap();

        let seen = browser.navigations();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].blocked, vec![ResourceType::Image, ResourceType::Font]);
    }
}
