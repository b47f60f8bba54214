use async_trait::async_trait;
use browserless_client::{
    BrowserlessClient, BrowserlessError, ContentRequest, GotoOptions, WaitForSelector,
};
use tracing::{info, warn};

use super::{Browser, LoadedPage, Navigation, NavigationError};

/// Remote headless Chrome via Browserless `/content`. Reports the target
/// page's status code, so HTTP 429/404 are visible to callers.
pub struct BrowserlessBrowser {
    client: BrowserlessClient,
}

impl BrowserlessBrowser {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        info!(base_url, "Using BrowserlessBrowser");
        Self {
            client: BrowserlessClient::new(base_url, token),
        }
    }
}

fn content_request(navigation: &Navigation) -> ContentRequest {
    ContentRequest {
        goto_options: Some(GotoOptions {
            wait_until: navigation.wait_until.as_puppeteer().to_string(),
            timeout: navigation.timeout.as_millis() as u64,
        }),
        wait_for_selector: navigation.wait_for.as_ref().map(|w| WaitForSelector {
            selector: w.selector.clone(),
            timeout: w.timeout.as_millis() as u64,
        }),
        reject_resource_types: navigation
            .blocked
            .iter()
            .map(|r| r.as_str().to_string())
            .collect(),
        ..ContentRequest::new(&navigation.url)
    }
}

fn map_error(navigation: &Navigation, err: BrowserlessError) -> NavigationError {
    match err {
        BrowserlessError::Timeout(message) => match &navigation.wait_for {
            Some(wait) if message.to_lowercase().contains("selector") => {
                NavigationError::SelectorTimeout {
                    selector: wait.selector.clone(),
                }
            }
            _ => NavigationError::NavigationTimeout(message),
        },
        BrowserlessError::Network(message) => NavigationError::Network(message),
        BrowserlessError::Api { status, message } => NavigationError::Http { status, message },
    }
}

#[async_trait]
impl Browser for BrowserlessBrowser {
    async fn navigate(&self, navigation: &Navigation) -> Result<LoadedPage, NavigationError> {
        let rendered = self
            .client
            .content(&content_request(navigation))
            .await
            .map_err(|e| {
                let mapped = map_error(navigation, e);
                warn!(url = navigation.url.as_str(), browser = "browserless", error = %mapped, "Navigation failed");
                mapped
            })?;

        let mut page = LoadedPage::new(&navigation.url, rendered.status, rendered.html);
        if let Some(final_url) = rendered.url {
            page.final_url = final_url;
        }
        Ok(page)
    }

    fn name(&self) -> &str {
        "browserless"
    }
}
