//! Error types for the analytics janitor.
//!
//! Datastore failures are classified once, where the driver call is made,
//! into a closed set of kinds. Everything above the datastore boundary
//! dispatches on those kinds instead of inspecting driver error types.

use thiserror::Error;

/// Message fragments that identify a statement timeout.
const TIMEOUT_MARKERS: &[&str] = &[
    "timeout expired",
    "statement timeout",
    "query timed out",
];

/// Restriction texts that are surfaced to the operator verbatim.
///
/// Some maintenance scripts need a higher product tier than the datastore
/// is running (online index rebuilds being the usual example).
pub const RESTRICTED_FEATURE_MARKERS: &[&str] = &[
    "Online index operations can only be performed in Enterprise edition of SQL Server",
    "Online index operations are not supported on this edition",
];

/// Classified kind of a datastore failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatastoreErrorKind {
    /// The statement ran longer than the configured script timeout.
    Timeout,
    /// The statement needs a feature the datastore edition does not offer.
    /// Carries the restriction text to show the operator.
    RestrictedFeature(String),
    /// Any other datastore failure.
    Generic,
}

/// A failed datastore call, classified at the driver boundary.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DatastoreError {
    kind: DatastoreErrorKind,
    message: String,
}

impl DatastoreError {
    pub fn new(kind: DatastoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(DatastoreErrorKind::Timeout, message)
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(DatastoreErrorKind::Generic, message)
    }

    /// Classify a raw driver message by its content.
    ///
    /// Used for drivers (and fakes) that do not expose structured error codes.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();

        if TIMEOUT_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Self::timeout(message);
        }

        if let Some(marker) = RESTRICTED_FEATURE_MARKERS
            .iter()
            .find(|m| lowered.contains(&m.to_lowercase()))
        {
            let restriction = (*marker).to_string();
            return Self::new(DatastoreErrorKind::RestrictedFeature(restriction), message);
        }

        Self::generic(message)
    }

    pub fn kind(&self) -> &DatastoreErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == DatastoreErrorKind::Timeout
    }

    /// The first `max_chars` characters of the driver message.
    pub fn short_info(&self, max_chars: usize) -> String {
        match self.message.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &self.message[..idx]),
            None => self.message.clone(),
        }
    }
}

/// Failure of a maintenance operation, as seen by the job runner.
#[derive(Debug, Error)]
pub enum JobError {
    /// Constraints could not be put back into a valid mode.
    #[error("Problem with adding/dropping constraints: {0}")]
    ConstraintFailure(String),

    /// A datastore call failed and nothing recovered it.
    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    /// The operation refused to start.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Anything else.
    #[error("Unexpected error: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

impl JobError {
    pub fn precondition(message: impl Into<String>) -> Self {
        JobError::Precondition(message.into())
    }
}

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The layered configuration could not be built or deserialized.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A value was read but is not acceptable.
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
