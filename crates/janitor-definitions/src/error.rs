//! Error types for definition synchronization.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The hierarchy file could not be read
    #[error("Failed to read hierarchy {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The hierarchy file is not valid
    #[error("Invalid hierarchy {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A definition root is missing from the hierarchy
    #[error("Root item could not be found: {0}")]
    RootNotFound(String),
}
