pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

/// Header Browserless sets to the status code of the target page's main response.
const RESPONSE_CODE_HEADER: &str = "x-response-code";
/// Header Browserless sets to the final (post-redirect) URL of the target page.
const RESPONSE_URL_HEADER: &str = "x-response-url";

/// Default HTTP timeout. Must outlast the navigation timeout Browserless enforces
/// on its side, otherwise we abort requests Browserless would still answer.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Body of a `/content` request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goto_options: Option<GotoOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<WaitForSelector>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reject_resource_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoOptions {
    /// Puppeteer lifecycle event: `domcontentloaded`, `load`, `networkidle0`, ...
    pub wait_until: String,
    /// Navigation timeout in milliseconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitForSelector {
    pub selector: String,
    /// Milliseconds.
    pub timeout: u64,
}

impl ContentRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

/// Rendered page returned by `/content`.
#[derive(Debug, Clone)]
pub struct RenderedContent {
    /// Status of the target page's main response, when Browserless reported it.
    pub status: Option<u16>,
    /// Final URL after redirects, when Browserless reported it.
    pub url: Option<String>,
    pub html: String,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, token: Option<&str>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    /// Fetch fully-rendered HTML content for a URL via Browserless /content endpoint.
    pub async fn content(&self, request: &ContentRequest) -> Result<RenderedContent> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        debug!(url = request.url.as_str(), "Browserless /content request");

        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            if status.as_u16() == 408 || is_timeout_message(&message) {
                return Err(BrowserlessError::Timeout(message));
            }
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let target_status = resp
            .headers()
            .get(RESPONSE_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u16>().ok());
        let final_url = resp
            .headers()
            .get(RESPONSE_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(RenderedContent {
            status: target_status,
            url: final_url,
            html: resp.text().await?,
        })
    }
}

fn is_timeout_message(message: &str) -> bool {
    message.contains("TimeoutError") || message.to_lowercase().contains("timed out")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_request_serializes_only_url() {
        let body = serde_json::to_value(ContentRequest::new("https://example.com")).unwrap();
        assert_eq!(body, serde_json::json!({ "url": "https://example.com" }));
    }

    #[test]
    fn full_request_uses_browserless_field_names() {
        let request = ContentRequest {
            url: "https://example.com/app".to_string(),
            goto_options: Some(GotoOptions {
                wait_until: "domcontentloaded".to_string(),
                timeout: 60_000,
            }),
            wait_for_selector: Some(WaitForSelector {
                selector: "table tbody tr".to_string(),
                timeout: 5_000,
            }),
            reject_resource_types: vec!["image".to_string(), "font".to_string()],
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["gotoOptions"]["waitUntil"], "domcontentloaded");
        assert_eq!(body["gotoOptions"]["timeout"], 60_000);
        assert_eq!(body["waitForSelector"]["selector"], "table tbody tr");
        assert_eq!(body["rejectResourceTypes"][1], "font");
    }

    #[test]
    fn timeout_messages_are_recognized() {
        assert!(is_timeout_message(
            "TimeoutError: Waiting for selector `div.grid` failed"
        ));
        assert!(is_timeout_message("Navigation timed out after 60000ms"));
        assert!(!is_timeout_message("Internal Server Error"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = BrowserlessClient::new("http://localhost:3000/", None);
        assert_eq!(client.base_url, "http://localhost:3000");
    }
}
