//! Datastore layer error types.
//!
//! These are startup/configuration failures. Failures of individual
//! statements are `janitor_types::DatastoreError`, classified at the driver.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while setting up the datastore layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// The connection string could not be parsed
    #[error("Invalid connection string: {0}")]
    ConnectionString(String),

    /// The datastore could not be reached
    #[error("Failed to connect to datastore: {0}")]
    Connect(#[from] sqlx::Error),

    /// The template store root does not exist
    #[error("Template root not found: {}", .0.display())]
    TemplateRootMissing(PathBuf),
}
