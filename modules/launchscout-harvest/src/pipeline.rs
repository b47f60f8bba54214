use std::sync::Arc;

use anyhow::{Context, Result};
use launchscout_common::{HarvestConfig, ListingRecord};
use tracing::info;

use crate::browser::{Browser, BrowserSession};
use crate::crawler::{popular, CategoryCrawler, CategoryOutcome, StopReason};
use crate::discovery::CategoryDiscoverer;
use crate::enricher::{DetailEnricher, EnrichStats};
use crate::extract::{LabeledDateExtractor, LaunchDateExtractor};
use crate::recovery::{RecoveryPass, RecoveryStats};
use crate::snapshot::SnapshotStore;

// ---------------------------------------------------------------------------
// Crawl stats
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct CrawlStats {
    pub categories: usize,
    pub pages_visited: u32,
    pub listings_seen: usize,
    pub listings: usize,
    pub popular: usize,
    pub stopped_page_absent: usize,
    pub stopped_empty: usize,
    pub stopped_no_next_page: usize,
    pub stopped_page_cap: usize,
    pub stopped_load_failed: usize,
}

impl CrawlStats {
    fn record(&mut self, outcome: &CategoryOutcome) {
        self.categories += 1;
        self.pages_visited += outcome.pages_visited;
        self.listings_seen += outcome.listings_seen;
        self.listings += outcome.listings.len();
        match outcome.stop {
            StopReason::PageAbsent => self.stopped_page_absent += 1,
            StopReason::EmptyContent => self.stopped_empty += 1,
            StopReason::NoNextPage => self.stopped_no_next_page += 1,
            StopReason::PageCap => self.stopped_page_cap += 1,
            StopReason::LoadFailed(_) => self.stopped_load_failed += 1,
        }
    }
}

impl std::fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Crawl Complete ===")?;
        writeln!(f, "Categories:       {}", self.categories)?;
        writeln!(f, "Pages visited:    {}", self.pages_visited)?;
        writeln!(f, "Listings seen:    {}", self.listings_seen)?;
        writeln!(f, "Unique listings:  {}", self.listings)?;
        writeln!(f, "Popular listings: {}", self.popular)?;
        writeln!(f, "\nCategory stops:")?;
        writeln!(f, "  No next page: {}", self.stopped_no_next_page)?;
        writeln!(f, "  Page absent:  {}", self.stopped_page_absent)?;
        writeln!(f, "  Empty page:   {}", self.stopped_empty)?;
        writeln!(f, "  Page cap:     {}", self.stopped_page_cap)?;
        write!(f, "  Load failed:  {}", self.stopped_load_failed)
    }
}

// ---------------------------------------------------------------------------
// Harvester
// ---------------------------------------------------------------------------

/// The three pipeline stages over one shared browser session. Stages hand
/// data to each other only through snapshots, so each can run on its own.
pub struct Harvester {
    config: HarvestConfig,
    session: BrowserSession,
    extractor: Box<dyn LaunchDateExtractor>,
    store: SnapshotStore,
}

impl Harvester {
    pub fn new(config: HarvestConfig, browser: Arc<dyn Browser>) -> Self {
        let max_tabs = config.enrich.concurrency.max(config.recover.concurrency);
        let session = BrowserSession::new(browser, max_tabs);
        let store = SnapshotStore::new(config.output.clone());
        Self {
            config,
            session,
            extractor: Box::new(LabeledDateExtractor::default()),
            store,
        }
    }

    pub fn with_extractor(mut self, extractor: impl LaunchDateExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn session(&self) -> &BrowserSession {
        &self.session
    }

    /// Discover categories, crawl them, and write the full and popular
    /// listing snapshots.
    pub async fn crawl(&self) -> Result<CrawlStats> {
        info!(browser = self.session.browser_name(), "Starting crawl");
        let tab = self
            .session
            .open_tab()
            .await
            .context("Failed to open browser tab")?;

        let categories = CategoryDiscoverer::new(&self.config.site, &self.config.crawl)
            .discover(&tab)
            .await
            .context("Failed to load category index")?;

        let outcomes = CategoryCrawler::new(&self.config.site, &self.config.crawl)
            .crawl_all(&tab, &categories)
            .await;
        tab.close();

        let mut stats = CrawlStats::default();
        let mut listings: Vec<ListingRecord> = Vec::new();
        for outcome in outcomes {
            stats.record(&outcome);
            listings.extend(outcome.listings);
        }

        let top = popular(&listings, self.config.crawl.popularity_threshold);
        stats.popular = top.len();

        self.store
            .write_all_listings(&listings)
            .context("Failed to write listing snapshot")?;
        self.store
            .write_top_listings(&top)
            .context("Failed to write popular listing snapshot")?;
        info!(
            all = %self.store.all_listings_path().display(),
            top = %self.store.top_listings_path().display(),
            "Saved listing snapshots"
        );
        Ok(stats)
    }

    /// Enrich every popular listing and write the enriched snapshot.
    /// Fails before any navigation when the popular listing snapshot is missing.
    pub async fn enrich(&self) -> Result<EnrichStats> {
        let listings = self.store.load_top_listings()?;
        info!(count = listings.len(), "Loaded listings to enrich");

        let (records, stats) =
            DetailEnricher::new(&self.session, self.extractor.as_ref(), &self.config.enrich)
                .enrich_all(&listings)
                .await;

        self.store
            .write_enriched(&records)
            .context("Failed to write enriched snapshot")?;
        info!(path = %self.store.enriched_path().display(), "Saved enriched snapshot");
        Ok(stats)
    }

    /// Retry records of the enriched snapshot that still lack a launch date.
    pub async fn recover(&self, skip_not_found: bool) -> Result<RecoveryStats> {
        let stats = RecoveryPass::new(
            &self.session,
            self.extractor.as_ref(),
            &self.config.recover,
            &self.store,
        )
        .skip_not_found(skip_not_found)
        .run()
        .await?;
        Ok(stats)
    }

    /// Crawl then enrich.
    pub async fn run(&self) -> Result<(CrawlStats, EnrichStats)> {
        let crawl = self.crawl().await?;
        info!("{crawl}");
        let enrich = self.enrich().await?;
        Ok((crawl, enrich))
    }
}
