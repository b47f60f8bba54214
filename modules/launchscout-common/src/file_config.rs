use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::error::HarvestError;
use crate::types::ResourceType;

/// Pipeline tuning loaded from an optional TOML file. Every field has a
/// default, so an empty file (or no file) reproduces the stock behavior.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub site: SiteConfig,
    pub crawl: CrawlConfig,
    pub enrich: PassConfig,
    pub recover: PassConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Category index page.
    pub categories_url: String,
    /// Substring identifying category links on the index page.
    pub category_link_marker: String,
    /// Substring identifying listing detail links on category pages.
    pub listing_link_pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    /// Hard cap on pages visited per category.
    pub max_pages_per_category: u32,
    /// Structure that must appear on a category page for it to count as present.
    pub listing_selector: String,
    pub listing_wait_ms: u64,
    pub index_wait_ms: u64,
    pub navigation_timeout_ms: u64,
    /// Listings need strictly more reviews than this to be enriched.
    pub popularity_threshold: u64,
}

/// Tuning for one enrichment pass (initial or recovery).
#[derive(Debug, Clone, PartialEq)]
pub struct PassConfig {
    /// Records per batch; all records in a batch run concurrently.
    pub concurrency: usize,
    /// Attempts allowed per record before it is marked exhausted.
    pub max_retries: u32,
    pub pre_request_delay_ms: u64,
    pub pre_request_jitter_ms: u64,
    pub backoff_unit_ms: u64,
    pub backoff_jitter_ms: u64,
    pub navigation_timeout_ms: u64,
    pub blocked_resources: Vec<ResourceType>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub all_listings: String,
    pub top_listings: String,
    pub enriched: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            categories_url: "https://sasi.heymantle.com/categories".to_string(),
            category_link_marker: "/category/".to_string(),
            listing_link_pattern: "apps.shopify.com".to_string(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages_per_category: 50,
            listing_selector: "div.grid, table tbody tr".to_string(),
            listing_wait_ms: 5_000,
            index_wait_ms: 10_000,
            navigation_timeout_ms: 30_000,
            popularity_threshold: 20,
        }
    }
}

impl PassConfig {
    /// First enrichment pass over every popular listing.
    pub fn initial() -> Self {
        Self {
            concurrency: 5,
            max_retries: 3,
            pre_request_delay_ms: 0,
            pre_request_jitter_ms: 3_000,
            backoff_unit_ms: 10_000,
            backoff_jitter_ms: 5_000,
            navigation_timeout_ms: 60_000,
            blocked_resources: ResourceType::non_essential(),
        }
    }

    /// Recovery pass over records still missing a launch date. Remaining
    /// records are mostly persistently rate limited: fewer workers, more attempts.
    pub fn recovery() -> Self {
        Self {
            concurrency: 2,
            max_retries: 5,
            pre_request_delay_ms: 2_000,
            pre_request_jitter_ms: 5_000,
            backoff_unit_ms: 5_000,
            backoff_jitter_ms: 5_000,
            navigation_timeout_ms: 60_000,
            blocked_resources: ResourceType::non_essential(),
        }
    }

    pub fn pre_request_delay(&self) -> Duration {
        Duration::from_millis(self.pre_request_delay_ms)
    }

    pub fn pre_request_jitter(&self) -> Duration {
        Duration::from_millis(self.pre_request_jitter_ms)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    pub fn backoff_jitter(&self) -> Duration {
        Duration::from_millis(self.backoff_jitter_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    fn validate(&mut self, name: &str) -> std::result::Result<(), HarvestError> {
        if self.concurrency == 0 {
            return Err(HarvestError::Config(format!("[{name}] concurrency must be >= 1")));
        }
        if self.max_retries == 0 {
            return Err(HarvestError::Config(format!("[{name}] max_retries must be >= 1")));
        }
        // Jitter wider than one unit would let backoff k+1 undercut backoff k.
        if self.backoff_jitter_ms > self.backoff_unit_ms {
            warn!(
                pass = name,
                backoff_jitter_ms = self.backoff_jitter_ms,
                backoff_unit_ms = self.backoff_unit_ms,
                "backoff_jitter_ms exceeds backoff_unit_ms, clamping"
            );
            self.backoff_jitter_ms = self.backoff_unit_ms;
        }
        Ok(())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            all_listings: "allApp.json".to_string(),
            top_listings: "topApps.json".to_string(),
            enriched: "topAppsRecent.json".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn all_listings_path(&self) -> PathBuf {
        self.dir.join(&self.all_listings)
    }

    pub fn top_listings_path(&self) -> PathBuf {
        self.dir.join(&self.top_listings)
    }

    pub fn enriched_path(&self) -> PathBuf {
        self.dir.join(&self.enriched)
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            crawl: CrawlConfig::default(),
            enrich: PassConfig::initial(),
            recover: PassConfig::recovery(),
            output: OutputConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Reject unusable settings and normalize the rest.
    pub fn validate(mut self) -> std::result::Result<Self, HarvestError> {
        if self.crawl.max_pages_per_category == 0 {
            return Err(HarvestError::Config(
                "[crawl] max_pages_per_category must be >= 1".to_string(),
            ));
        }
        if self.site.listing_link_pattern.trim().is_empty() {
            return Err(HarvestError::Config(
                "[site] listing_link_pattern must not be empty".to_string(),
            ));
        }
        self.enrich.validate("enrich")?;
        self.recover.validate("recover")?;
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// TOML file shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    site: SiteConfig,
    crawl: CrawlConfig,
    enrich: PassOverrides,
    recover: PassOverrides,
    output: OutputConfig,
}

/// Per-pass table. Unset keys fall back to that pass's own defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PassOverrides {
    concurrency: Option<usize>,
    max_retries: Option<u32>,
    pre_request_delay_ms: Option<u64>,
    pre_request_jitter_ms: Option<u64>,
    backoff_unit_ms: Option<u64>,
    backoff_jitter_ms: Option<u64>,
    navigation_timeout_ms: Option<u64>,
    blocked_resources: Option<Vec<ResourceType>>,
}

impl PassOverrides {
    fn resolve(self, base: PassConfig) -> PassConfig {
        PassConfig {
            concurrency: self.concurrency.unwrap_or(base.concurrency),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            pre_request_delay_ms: self.pre_request_delay_ms.unwrap_or(base.pre_request_delay_ms),
            pre_request_jitter_ms: self
                .pre_request_jitter_ms
                .unwrap_or(base.pre_request_jitter_ms),
            backoff_unit_ms: self.backoff_unit_ms.unwrap_or(base.backoff_unit_ms),
            backoff_jitter_ms: self.backoff_jitter_ms.unwrap_or(base.backoff_jitter_ms),
            navigation_timeout_ms: self
                .navigation_timeout_ms
                .unwrap_or(base.navigation_timeout_ms),
            blocked_resources: self.blocked_resources.unwrap_or(base.blocked_resources),
        }
    }
}

impl From<FileConfig> for HarvestConfig {
    fn from(file: FileConfig) -> Self {
        Self {
            site: file.site,
            crawl: file.crawl,
            enrich: file.enrich.resolve(PassConfig::initial()),
            recover: file.recover.resolve(PassConfig::recovery()),
            output: file.output,
        }
    }
}

/// Parse harvest config from TOML text.
pub fn parse_config(content: &str) -> Result<HarvestConfig> {
    let file: FileConfig = toml::from_str(content).context("Failed to parse harvest config")?;
    Ok(HarvestConfig::from(file).validate()?)
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<HarvestConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}
