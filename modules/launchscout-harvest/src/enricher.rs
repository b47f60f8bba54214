use std::time::Duration;

use futures::future::join_all;
use launchscout_common::{EnrichedRecord, ListingRecord, PassConfig};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, Navigation, NavigationError, Tab, WaitUntil};
use crate::extract::{is_not_found, is_rate_limited, LaunchDateExtractor};

// ---------------------------------------------------------------------------
// Failure taxonomy
// ---------------------------------------------------------------------------

/// Why an enrichment attempt (or a whole record) did not produce a date.
/// The `Display` text is what gets persisted in a record's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrichFailure {
    #[error("RATE_LIMITED")]
    RateLimited,

    #[error("{0}")]
    TransientNetwork(String),

    #[error("DATE_NOT_FOUND")]
    ExtractionMiss,

    #[error("404")]
    ResourceNotFound,

    #[error("Max Retries Exceeded")]
    RetryBudgetExhausted,

    #[error("{0}")]
    Fatal(String),
}

impl EnrichFailure {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            EnrichFailure::RateLimited
                | EnrichFailure::TransientNetwork(_)
                | EnrichFailure::ExtractionMiss
        )
    }
}

impl From<NavigationError> for EnrichFailure {
    fn from(e: NavigationError) -> Self {
        match &e {
            _ if e.is_timeout() => EnrichFailure::TransientNetwork(e.to_string()),
            NavigationError::Network(_) => EnrichFailure::TransientNetwork(e.to_string()),
            NavigationError::Http { status: 429, .. } => EnrichFailure::RateLimited,
            NavigationError::Http { status, .. } if (502..=504).contains(status) => {
                EnrichFailure::TransientNetwork(e.to_string())
            }
            _ => EnrichFailure::Fatal(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Pre-request jitter and linear-with-jitter backoff for one pass.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pre_request_delay: Duration,
    pre_request_jitter: Duration,
    backoff_unit: Duration,
    backoff_jitter: Duration,
}

impl RetryPolicy {
    pub fn from_pass(pass: &PassConfig) -> Self {
        Self {
            max_retries: pass.max_retries,
            pre_request_delay: pass.pre_request_delay(),
            pre_request_jitter: pass.pre_request_jitter(),
            backoff_unit: pass.backoff_unit(),
            // Never wider than a unit, so backoff(k + 1) >= backoff(k).
            backoff_jitter: pass.backoff_jitter().min(pass.backoff_unit()),
        }
    }

    /// Delay before every attempt, spreading a batch's requests apart.
    pub fn pre_request(&self) -> Duration {
        self.pre_request_delay + random_up_to(self.pre_request_jitter)
    }

    /// Wait after the `retry`-th retriable failure (1-based): `unit * retry + jitter`.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_unit * retry + random_up_to(self.backoff_jitter)
    }
}

fn random_up_to(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_ms))
}

// ---------------------------------------------------------------------------
// Per-record state
// ---------------------------------------------------------------------------

/// Attempt history of one record, carried through its retry loop.
#[derive(Debug, Clone, Default)]
pub struct RecordAttempts {
    pub attempts: u32,
    pub retries: u32,
    /// Backoff waits taken, in order.
    pub backoffs: Vec<Duration>,
    pub last_failure: Option<EnrichFailure>,
}

/// Terminal result for one record.
#[derive(Debug, Clone)]
pub struct EnrichmentReport {
    pub record: EnrichedRecord,
    /// `None` when the record was enriched.
    pub failure: Option<EnrichFailure>,
    pub history: RecordAttempts,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct EnrichStats {
    pub records: usize,
    pub batches: usize,
    pub enriched: usize,
    pub not_found: usize,
    pub exhausted: usize,
    pub fatal: usize,
    pub attempts: u32,
    pub retries: u32,
}

impl EnrichStats {
    pub fn record(&mut self, report: &EnrichmentReport) {
        self.records += 1;
        self.attempts += report.history.attempts;
        self.retries += report.history.retries;
        match &report.failure {
            None => self.enriched += 1,
            Some(EnrichFailure::ResourceNotFound) => self.not_found += 1,
            Some(EnrichFailure::RetryBudgetExhausted) => self.exhausted += 1,
            Some(_) => self.fatal += 1,
        }
    }
}

impl std::fmt::Display for EnrichStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Enrichment Complete ===")?;
        writeln!(f, "Records:          {}", self.records)?;
        writeln!(f, "Batches:          {}", self.batches)?;
        writeln!(f, "Enriched:         {}", self.enriched)?;
        writeln!(f, "Not found (404):  {}", self.not_found)?;
        writeln!(f, "Retries exceeded: {}", self.exhausted)?;
        writeln!(f, "Fatal:            {}", self.fatal)?;
        writeln!(f, "Attempts:         {}", self.attempts)?;
        write!(f, "Retries:          {}", self.retries)
    }
}

// ---------------------------------------------------------------------------
// DetailEnricher
// ---------------------------------------------------------------------------

/// Visits listing detail pages and extracts launch dates, batch by batch.
///
/// Records in a batch run concurrently on their own tabs; batches run
/// strictly in sequence. Every record ends in a terminal state: a date, or
/// an error string. Record failures never abort the batch.
pub struct DetailEnricher<'a> {
    session: &'a BrowserSession,
    extractor: &'a dyn LaunchDateExtractor,
    pass: &'a PassConfig,
    policy: RetryPolicy,
}

impl<'a> DetailEnricher<'a> {
    pub fn new(
        session: &'a BrowserSession,
        extractor: &'a dyn LaunchDateExtractor,
        pass: &'a PassConfig,
    ) -> Self {
        Self {
            session,
            extractor,
            pass,
            policy: RetryPolicy::from_pass(pass),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.pass.concurrency.max(1)
    }

    /// Enrich every listing, returning records in input order.
    pub async fn enrich_all(&self, listings: &[ListingRecord]) -> (Vec<EnrichedRecord>, EnrichStats) {
        let mut stats = EnrichStats::default();
        let mut records = Vec::with_capacity(listings.len());
        let total_batches = listings.len().div_ceil(self.batch_size());

        for (i, batch) in listings.chunks(self.batch_size()).enumerate() {
            let reports = self.enrich_batch(batch).await;
            stats.batches += 1;
            for report in reports {
                stats.record(&report);
                records.push(report.record);
            }
            info!(
                batch = i + 1,
                of = total_batches,
                processed = records.len(),
                total = listings.len(),
                "Batch complete"
            );
        }
        (records, stats)
    }

    /// Run one batch concurrently. Returns once every record is terminal.
    pub async fn enrich_batch(&self, batch: &[ListingRecord]) -> Vec<EnrichmentReport> {
        join_all(batch.iter().map(|listing| self.enrich_one(listing))).await
    }

    pub async fn enrich_one(&self, listing: &ListingRecord) -> EnrichmentReport {
        let mut history = RecordAttempts::default();

        let mut tab = match self.session.open_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                let failure = EnrichFailure::from(e);
                warn!(url = listing.url.as_str(), error = %failure, "Could not open tab");
                return report(listing, Err(failure), history);
            }
        };
        tab.block_resources(&self.pass.blocked_resources);

        let result = self.retry_loop(&tab, listing, &mut history).await;
        tab.close();

        match &result {
            Ok(date) => info!(name = listing.name.as_str(), launch_date = date.as_str(), "Launched"),
            Err(EnrichFailure::ResourceNotFound) => {
                info!(name = listing.name.as_str(), "Listing not found (404)")
            }
            Err(EnrichFailure::RetryBudgetExhausted) => warn!(
                name = listing.name.as_str(),
                attempts = history.attempts,
                last = ?history.last_failure,
                "Failed after max retries"
            ),
            Err(e) => warn!(name = listing.name.as_str(), error = %e, "Fatal error"),
        }
        report(listing, result, history)
    }

    async fn retry_loop(
        &self,
        tab: &Tab,
        listing: &ListingRecord,
        history: &mut RecordAttempts,
    ) -> Result<String, EnrichFailure> {
        loop {
            tokio::time::sleep(self.policy.pre_request()).await;
            history.attempts += 1;

            let failure = match self.attempt(tab, &listing.url).await {
                Ok(date) => return Ok(date),
                Err(failure) if !failure.is_retriable() => return Err(failure),
                Err(failure) => failure,
            };

            history.retries += 1;
            history.last_failure = Some(failure.clone());
            if history.retries >= self.policy.max_retries {
                return Err(EnrichFailure::RetryBudgetExhausted);
            }

            let wait = self.policy.backoff(history.retries);
            debug!(
                name = listing.name.as_str(),
                reason = %failure,
                attempt = history.attempts,
                wait_ms = wait.as_millis() as u64,
                "Retrying after backoff"
            );
            history.backoffs.push(wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// One navigation plus classification of what came back.
    async fn attempt(&self, tab: &Tab, url: &str) -> Result<String, EnrichFailure> {
        let page = tab
            .goto(
                Navigation::to(url)
                    .wait_until(WaitUntil::DomContentLoaded)
                    .timeout(self.pass.navigation_timeout()),
            )
            .await?;

        if is_rate_limited(&page) {
            return Err(EnrichFailure::RateLimited);
        }
        if let Some(date) = self.extractor.extract(&page) {
            return Ok(date);
        }
        if is_not_found(&page) {
            return Err(EnrichFailure::ResourceNotFound);
        }
        Err(EnrichFailure::ExtractionMiss)
    }
}

fn report(
    listing: &ListingRecord,
    result: Result<String, EnrichFailure>,
    history: RecordAttempts,
) -> EnrichmentReport {
    match result {
        Ok(date) => EnrichmentReport {
            record: EnrichedRecord::enriched(listing.clone(), date),
            failure: None,
            history,
        },
        Err(failure) => EnrichmentReport {
            record: EnrichedRecord::failed(listing.clone(), failure.to_string()),
            failure: Some(failure),
            history,
        },
    }
}
