use std::path::{Path, PathBuf};

use thiserror::Error;

/// usertime error types
#[derive(Error, Debug)]
pub enum UsertimeError {
    /// Accounting command could not run or reported failure
    #[error("accounting source unavailable: {0}")]
    SourceUnavailable(String),

    /// Snapshot store read/write/delete failed
    #[error("persistence error at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// User registry could not be read
    #[error("registry error: {0}")]
    Registry(String),

    /// Another run holds the snapshot directory
    #[error("store locked: {0}")]
    Locked(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl UsertimeError {
    pub fn persistence(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result type alias for usertime
pub type Result<T> = std::result::Result<T, UsertimeError>;
