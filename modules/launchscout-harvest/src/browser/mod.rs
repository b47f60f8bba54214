//! Browser automation capability.
//!
//! Everything the pipeline needs from a headless browser sits behind the
//! `Browser` trait: navigate to an address, optionally wait for a selector,
//! block sub-resources, and hand back the loaded document together with the
//! main response's status. A navigation returns its own response, so there is
//! no window between "register a listener" and "navigation finished".
//!
//! Backends: Browserless (remote) and local Chromium --dump-dom. Tests use
//! `testing::MockBrowser`.

mod browserless;
mod chrome;
mod session;

pub use browserless::BrowserlessBrowser;
pub use chrome::ChromeBrowser;
pub use session::{BrowserSession, Tab};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use launchscout_common::{Config, ResourceType};
use scraper::{Html, Selector};

use crate::extract::visible_text;

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// Lifecycle event a navigation waits for before it is considered loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

impl WaitUntil {
    pub fn as_puppeteer(&self) -> &'static str {
        match self {
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::Load => "load",
            WaitUntil::NetworkIdle => "networkidle0",
        }
    }
}

/// Wait (bounded) for a CSS selector to match after the page loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitFor {
    pub selector: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub url: String,
    pub wait_until: WaitUntil,
    pub timeout: Duration,
    pub wait_for: Option<WaitFor>,
    pub blocked: Vec<ResourceType>,
}

impl Navigation {
    pub fn to(url: &str) -> Self {
        Self {
            url: url.to_string(),
            wait_until: WaitUntil::DomContentLoaded,
            timeout: Duration::from_secs(30),
            wait_for: None,
            blocked: Vec::new(),
        }
    }

    pub fn wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = wait_until;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn wait_for(mut self, selector: &str, timeout: Duration) -> Self {
        self.wait_for = Some(WaitFor {
            selector: selector.to_string(),
            timeout,
        });
        self
    }

    pub fn block(mut self, resources: &[ResourceType]) -> Self {
        self.blocked = resources.to_vec();
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("Timed out waiting for selector `{selector}`")]
    SelectorTimeout { selector: String },

    #[error("Navigation timeout: {0}")]
    NavigationTimeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Browser HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("{0}")]
    Other(String),
}

impl NavigationError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            NavigationError::SelectorTimeout { .. } | NavigationError::NavigationTimeout(_)
        )
    }
}

// ---------------------------------------------------------------------------
// LoadedPage
// ---------------------------------------------------------------------------

/// A loaded document plus what is known about its main response.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub requested_url: String,
    /// Address after redirects. Equal to `requested_url` when unknown.
    pub final_url: String,
    /// Main response status, when the backend can report it.
    pub status: Option<u16>,
    pub html: String,
}

impl LoadedPage {
    pub fn new(url: &str, status: Option<u16>, html: impl Into<String>) -> Self {
        Self {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            status,
            html: html.into(),
        }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Text of the `<title>` element, trimmed. Empty when absent.
    pub fn title(&self) -> String {
        let selector = Selector::parse("title").expect("valid selector");
        self.document()
            .select(&selector)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    /// Rendered-ish text of the body, one line per text node.
    pub fn visible_text(&self) -> String {
        visible_text(&self.document())
    }
}

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Browser: Send + Sync {
    async fn navigate(&self, navigation: &Navigation) -> Result<LoadedPage, NavigationError>;

    fn name(&self) -> &str;
}

/// Pick the browser backend the environment points at.
pub fn browser_from_config(config: &Config) -> Arc<dyn Browser> {
    match config.browserless_url.as_deref() {
        Some(url) => Arc::new(BrowserlessBrowser::new(
            url,
            config.browserless_token.as_deref(),
        )),
        None => Arc::new(ChromeBrowser::new(&config.chrome_bin)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_builder_sets_fields() {
        let nav = Navigation::to("https://sasi.heymantle.com/category/reviews")
            .wait_until(WaitUntil::NetworkIdle)
            .timeout(Duration::from_secs(60))
            .wait_for("table tbody tr", Duration::from_secs(5))
            .block(&[ResourceType::Image]);
        assert_eq!(nav.wait_until.as_puppeteer(), "networkidle0");
        assert_eq!(nav.timeout, Duration::from_secs(60));
        assert_eq!(nav.wait_for.unwrap().selector, "table tbody tr");
        assert_eq!(nav.blocked, vec![ResourceType::Image]);
    }

    #[test]
    fn page_title_and_text() {
        let page = LoadedPage::new(
            "https://apps.shopify.com/a",
            Some(200),
            "<html><head><title> 404 Not Found </title><style>p{}</style></head>\
             <body><h1>Gone</h1><script>var x = 1;</script><p>Nothing here</p></body></html>",
        );
        assert_eq!(page.title(), "404 Not Found");
        assert_eq!(page.visible_text(), "Gone\nNothing here");
    }

    #[test]
    fn timeouts_are_flagged() {
        assert!(NavigationError::SelectorTimeout {
            selector: "a".into()
        }
        .is_timeout());
        assert!(NavigationError::NavigationTimeout("60s".into()).is_timeout());
        assert!(!NavigationError::Network("reset".into()).is_timeout());
    }
}
