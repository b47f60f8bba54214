pub mod canonical;
pub mod config;
pub mod error;
pub mod file_config;
pub mod types;

pub use canonical::canonicalize;
pub use config::Config;
pub use error::HarvestError;
pub use file_config::{
    load_config, parse_config, CrawlConfig, HarvestConfig, OutputConfig, PassConfig, SiteConfig,
};
pub use types::*;
