use launchscout_common::{HarvestError, PassConfig};
use tracing::info;

use crate::browser::BrowserSession;
use crate::enricher::{DetailEnricher, EnrichStats};
use crate::extract::LaunchDateExtractor;
use crate::snapshot::SnapshotStore;

/// Error text marking a listing that no longer exists.
const NOT_FOUND: &str = "404";

#[derive(Debug, Default, Clone)]
pub struct RecoveryStats {
    /// Records in the snapshot.
    pub total: usize,
    /// Records selected for another attempt.
    pub pending: usize,
    pub recovered: usize,
    pub still_missing: usize,
    pub checkpoints: usize,
    pub enrich: EnrichStats,
}

impl std::fmt::Display for RecoveryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Recovery Complete ===")?;
        writeln!(f, "Snapshot records: {}", self.total)?;
        writeln!(f, "Pending:          {}", self.pending)?;
        writeln!(f, "Recovered:        {}", self.recovered)?;
        writeln!(f, "Still missing:    {}", self.still_missing)?;
        writeln!(f, "Checkpoints:      {}", self.checkpoints)?;
        write!(f, "Attempts:         {}", self.enrich.attempts)
    }
}

/// Re-enriches records of the enriched snapshot that still lack a launch
/// date, checkpointing the whole snapshot after every batch.
pub struct RecoveryPass<'a> {
    session: &'a BrowserSession,
    extractor: &'a dyn LaunchDateExtractor,
    pass: &'a PassConfig,
    store: &'a SnapshotStore,
    skip_not_found: bool,
}

impl<'a> RecoveryPass<'a> {
    pub fn new(
        session: &'a BrowserSession,
        extractor: &'a dyn LaunchDateExtractor,
        pass: &'a PassConfig,
        store: &'a SnapshotStore,
    ) -> Self {
        Self {
            session,
            extractor,
            pass,
            store,
            skip_not_found: false,
        }
    }

    /// Leave records already known to be gone (`"404"`) alone.
    pub fn skip_not_found(mut self, skip: bool) -> Self {
        self.skip_not_found = skip;
        self
    }

    pub async fn run(&self) -> Result<RecoveryStats, HarvestError> {
        let mut records = self.store.load_enriched()?;
        let mut stats = RecoveryStats {
            total: records.len(),
            ..Default::default()
        };

        let pending: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.has_launch_date())
            .filter(|(_, r)| !(self.skip_not_found && r.error.as_deref() == Some(NOT_FOUND)))
            .map(|(i, _)| i)
            .collect();
        stats.pending = pending.len();

        if pending.is_empty() {
            info!(total = stats.total, "No records missing a launch date, nothing to do");
            return Ok(stats);
        }
        info!(pending = pending.len(), total = stats.total, "Retrying records missing a launch date");

        let enricher = DetailEnricher::new(self.session, self.extractor, self.pass);
        let total_batches = pending.len().div_ceil(enricher.batch_size());

        for (i, batch) in pending.chunks(enricher.batch_size()).enumerate() {
            let listings: Vec<_> = batch.iter().map(|&idx| records[idx].listing.clone()).collect();
            let reports = enricher.enrich_batch(&listings).await;

            for (&idx, report) in batch.iter().zip(reports) {
                stats.enrich.record(&report);
                if report.record.has_launch_date() {
                    stats.recovered += 1;
                }
                records[idx].apply(report.record);
            }
            stats.enrich.batches += 1;

            self.store.write_enriched(&records)?;
            stats.checkpoints += 1;
            info!(
                batch = i + 1,
                of = total_batches,
                recovered = stats.recovered,
                "Checkpoint written"
            );
        }

        stats.still_missing = records.iter().filter(|r| !r.has_launch_date()).count();
        Ok(stats)
    }
}
