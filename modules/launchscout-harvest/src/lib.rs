pub mod browser;
pub mod crawler;
pub mod dedup;
pub mod discovery;
pub mod enricher;
pub mod extract;
pub mod pipeline;
pub mod recovery;
pub mod snapshot;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use pipeline::{CrawlStats, Harvester};
