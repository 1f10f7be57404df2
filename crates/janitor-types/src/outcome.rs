//! Results of script execution and definition synchronization.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// A statement of a composite script that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementFailure {
    pub statement: String,
    pub error: String,
}

/// Result of executing one script.
///
/// For a single statement only `rows_affected` and `succeeded` are
/// meaningful; composite scripts fill in the per-statement tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutcome {
    /// Sum of rows affected by the statements that succeeded.
    pub rows_affected: u64,
    /// Number of statements that succeeded.
    pub succeeded: usize,
    /// Statements that failed, in execution order.
    pub failures: Vec<StatementFailure>,
}

impl ScriptOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, rows_affected: u64) {
        self.succeeded += 1;
        self.rows_affected += rows_affected;
    }

    pub fn record_failure(&mut self, statement: impl Into<String>, error: impl Into<String>) {
        self.failures.push(StatementFailure {
            statement: statement.into(),
            error: error.into(),
        });
    }

    /// Total statements attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    /// True when no statement failed (vacuously true for an empty script).
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Success/failure tally of a synchronized subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success_count: u64,
    pub fail_count: u64,
}

impl SyncResult {
    pub fn new(success_count: u64, fail_count: u64) -> Self {
        Self {
            success_count,
            fail_count,
        }
    }

    pub fn total(&self) -> u64 {
        self.success_count + self.fail_count
    }
}

impl AddAssign for SyncResult {
    fn add_assign(&mut self, rhs: Self) {
        self.success_count += rhs.success_count;
        self.fail_count += rhs.fail_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_outcome_tally() {
        let mut outcome = ScriptOutcome::new();
        assert!(outcome.all_succeeded());
        assert_eq!(outcome.attempted(), 0);

        outcome.record_success(10);
        outcome.record_failure("DELETE FROM x", "no such table");
        outcome.record_success(5);

        assert_eq!(outcome.rows_affected, 15);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.attempted(), 3);
        assert!(!outcome.all_succeeded());
        assert_eq!(outcome.failures[0].statement, "DELETE FROM x");
    }

    #[test]
    fn test_sync_result_fold() {
        let mut total = SyncResult::new(1, 0);
        total += SyncResult::new(3, 2);
        assert_eq!(total, SyncResult::new(4, 2));
        assert_eq!(total.total(), 6);
    }
}
