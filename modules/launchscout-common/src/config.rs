use std::env;

use tracing::info;

/// Endpoint configuration loaded from environment variables.
/// Tuning knobs live in the TOML file config (see `file_config`).
#[derive(Debug, Clone)]
pub struct Config {
    // Browserless (remote headless Chrome). Unset selects local Chromium.
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,

    // Local Chromium
    pub chrome_bin: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            browserless_url: optional_env("BROWSERLESS_URL"),
            browserless_token: optional_env("BROWSERLESS_TOKEN"),
            chrome_bin: optional_env("CHROME_BIN").unwrap_or_else(|| "chromium".to_string()),
        }
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        info!(
            browserless_url = self.browserless_url.as_deref().unwrap_or("(unset)"),
            browserless_token = if self.browserless_token.is_some() { "[set]" } else { "(unset)" },
            chrome_bin = self.chrome_bin.as_str(),
            "Loaded environment config"
        );
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
