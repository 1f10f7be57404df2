//! The closed catalog of bulk maintenance operations.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format used for the `FilteredCleanOlderThan` threshold, both when parsing
/// operator input and when substituting it into a script.
pub const THRESHOLD_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One maintenance operation with its parameters.
///
/// Immutable once constructed; fully determines which script templates are
/// resolved and in what order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaintenanceOperation {
    /// Delete all collected visit data, optionally including IP lookup data.
    FullClean { remove_ips: bool },
    /// Delete visits older than the threshold.
    FilteredCleanOlderThan { threshold: NaiveDateTime },
    /// Delete bounce visits (single page view).
    FilteredCleanBounce,
    /// Delete visits whose `column` equals `literal`.
    FilteredCleanCustomRule { column: String, literal: String },
    /// Rebuild datastore indexes, online or offline.
    RebuildIndex { online: bool },
    /// Delete visits recorded for robots.
    RemoveBots,
    /// Write a datastore-native backup to the destination.
    Backup { destination_path: PathBuf },
    /// Push every definition record from the hierarchy into the datastore.
    SyncDefinitions,
}

impl MaintenanceOperation {
    /// Stable machine name, used in logs and audit entries.
    pub fn name(&self) -> &'static str {
        match self {
            MaintenanceOperation::FullClean { .. } => "clean_all",
            MaintenanceOperation::FilteredCleanOlderThan { .. } => "clean_older_than",
            MaintenanceOperation::FilteredCleanBounce => "clean_bounce_visits",
            MaintenanceOperation::FilteredCleanCustomRule { .. } => "clean_custom_rule",
            MaintenanceOperation::RebuildIndex { .. } => "rebuild_index",
            MaintenanceOperation::RemoveBots => "remove_bots",
            MaintenanceOperation::Backup { .. } => "backup_database",
            MaintenanceOperation::SyncDefinitions => "sync_definitions",
        }
    }

    /// Whether the operation deletes in bulk and therefore must run inside
    /// the cascade constraint bracket.
    pub fn is_governed(&self) -> bool {
        matches!(
            self,
            MaintenanceOperation::FullClean { .. }
                | MaintenanceOperation::FilteredCleanOlderThan { .. }
                | MaintenanceOperation::FilteredCleanBounce
                | MaintenanceOperation::FilteredCleanCustomRule { .. }
                | MaintenanceOperation::RemoveBots
        )
    }

    /// Parse an operator-supplied threshold in [`THRESHOLD_FORMAT`].
    pub fn parse_threshold(input: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        NaiveDateTime::parse_from_str(input.trim(), THRESHOLD_FORMAT)
    }
}

impl fmt::Display for MaintenanceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceOperation::FullClean { remove_ips } => {
                write!(f, "clean_all(remove_ips={remove_ips})")
            }
            MaintenanceOperation::FilteredCleanOlderThan { threshold } => {
                write!(
                    f,
                    "clean_older_than(threshold={})",
                    threshold.format(THRESHOLD_FORMAT)
                )
            }
            MaintenanceOperation::FilteredCleanCustomRule { column, literal } => {
                write!(f, "clean_custom_rule(column={column}, value={literal})")
            }
            MaintenanceOperation::RebuildIndex { online } => {
                write!(f, "rebuild_index(online={online})")
            }
            MaintenanceOperation::Backup { destination_path } => {
                write!(f, "backup_database(path={})", destination_path.display())
            }
            other => f.write_str(other.name()),
        }
    }
}

/// Referential-integrity mode of the datastore.
///
/// This is datastore-global state, not owned by any one job. The rest
/// value is `Standard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintMode {
    /// Constraints cascade deletes to dependent rows.
    Cascade,
    /// Normal, non-cascading constraints.
    #[default]
    Standard,
}
