use std::time::Duration;

use async_trait::async_trait;
use launchscout_common::ResourceType;
use scraper::{Html, Selector};
use tracing::{info, warn};

use super::{Browser, LoadedPage, Navigation, NavigationError};

/// Local headless Chromium via `--dump-dom`.
///
/// Chromium does not expose the main response status on this path, so pages
/// come back with `status: None` and throttling/not-found detection falls back
/// to page content. Selector waits become a virtual-time budget followed by a
/// check against the dumped DOM.
pub struct ChromeBrowser {
    chrome_bin: String,
}

impl ChromeBrowser {
    pub fn new(chrome_bin: &str) -> Self {
        info!(chrome_bin, "Using ChromeBrowser (dump-dom)");
        Self {
            chrome_bin: chrome_bin.to_string(),
        }
    }

    fn args(&self, navigation: &Navigation, profile_dir: &str) -> Vec<String> {
        let mut args = vec![
            "--headless".to_string(),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--user-data-dir={profile_dir}"),
        ];
        if navigation.blocked.contains(&ResourceType::Image) {
            args.push("--blink-settings=imagesEnabled=false".to_string());
        }
        if let Some(wait) = &navigation.wait_for {
            args.push(format!("--virtual-time-budget={}", wait.timeout.as_millis()));
        }
        args.push("--dump-dom".to_string());
        args.push(navigation.url.clone());
        args
    }
}

/// Fork/resource exhaustion on the host. Worth another attempt later.
fn is_transient_error(msg: &str) -> bool {
    msg.contains("Cannot fork") || msg.contains("Resource temporarily unavailable")
}

fn selector_present(html: &str, selector: &str) -> Result<bool, NavigationError> {
    let parsed = Selector::parse(selector)
        .map_err(|e| NavigationError::Other(format!("Invalid selector `{selector}`: {e:?}")))?;
    Ok(Html::parse_document(html).select(&parsed).next().is_some())
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn navigate(&self, navigation: &Navigation) -> Result<LoadedPage, NavigationError> {
        let parsed = url::Url::parse(&navigation.url)
            .map_err(|e| NavigationError::Other(format!("Invalid URL {}: {e}", navigation.url)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(NavigationError::Other(format!(
                "Only http/https URLs allowed, got: {}",
                parsed.scheme()
            )));
        }

        let tmp_dir = tempfile::tempdir()
            .map_err(|e| NavigationError::Other(format!("Failed to create temp profile dir: {e}")))?;
        let args = self.args(navigation, &tmp_dir.path().display().to_string());

        let budget = navigation.timeout
            + navigation
                .wait_for
                .as_ref()
                .map(|w| w.timeout)
                .unwrap_or(Duration::ZERO);

        let output = match tokio::time::timeout(
            budget,
            tokio::process::Command::new(&self.chrome_bin)
                .args(&args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let msg = e.to_string();
                if is_transient_error(&msg) {
                    return Err(NavigationError::Network(msg));
                }
                return Err(NavigationError::Other(format!(
                    "Failed to run Chrome for {}: {e}",
                    navigation.url
                )));
            }
            Err(_) => {
                return Err(NavigationError::NavigationTimeout(format!(
                    "Chrome timed out after {}ms for {}",
                    budget.as_millis(),
                    navigation.url
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(url = navigation.url.as_str(), browser = "chrome", stderr = %stderr, "Chrome exited with error");
            if is_transient_error(&stderr) {
                return Err(NavigationError::Network(stderr.into_owned()));
            }
            return Err(NavigationError::Other(format!(
                "Chrome exited with {}",
                output.status
            )));
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            return Err(NavigationError::Network(format!(
                "Empty DOM for {}",
                navigation.url
            )));
        }

        if let Some(wait) = &navigation.wait_for {
            if !selector_present(&html, &wait.selector)? {
                return Err(NavigationError::SelectorTimeout {
                    selector: wait.selector.clone(),
                });
            }
        }

        Ok(LoadedPage::new(&navigation.url, None, html))
    }

    fn name(&self) -> &str {
        "chrome"
    }
}
