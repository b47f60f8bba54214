use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Required snapshot not found: {0} (run the previous stage first)")]
    MissingSnapshot(PathBuf),

    #[error("Snapshot error ({path}): {message}")]
    Snapshot { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
