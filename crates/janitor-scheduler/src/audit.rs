//! Audit trail of operator-visible actions.

use std::sync::Mutex;

use tracing::info;

/// Sink for audit entries. Recording never fails.
pub trait AuditLog: Send + Sync {
    fn record(&self, actor: &str, message: &str);
}

/// Writes audit entries as tracing events on the `janitor::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn record(&self, actor: &str, message: &str) {
        info!(target: "janitor::audit", actor, "{}", message);
    }
}

/// One recorded audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub actor: String,
    pub message: String,
}

/// Keeps audit entries in memory, in recording order.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, actor: &str, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(AuditEntry {
                actor: actor.to_string(),
                message: message.to_string(),
            });
    }
}
