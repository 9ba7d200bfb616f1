//! Audit logging: one entry per tool invocation attempt.
//!
//! Recording never fails the caller. A poisoned lock is recovered and the
//! entry is still appended. The in-memory copy is bounded; sinks see every
//! entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slo_core::UserId;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Entries kept in memory before the oldest are dropped.
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: UserId,
    pub tool: String,
    pub params: serde_json::Value,
    /// Whether the invocation produced a result
    pub result_present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Trait for audit log sinks (where entries are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Append-only audit log that keeps the most recent entries in memory and
/// forwards each one to its sinks.
pub struct AuditLogger {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a new audit logger with the given sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: DEFAULT_AUDIT_CAPACITY,
            sinks,
        }
    }

    /// Keep at most `capacity` entries in memory (minimum 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Record one tool invocation attempt.
    pub fn record_audit(
        &self,
        user_id: UserId,
        tool: &str,
        params: &serde_json::Value,
        result: Option<&serde_json::Value>,
        error: Option<&str>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            user_id,
            tool: tool.to_string(),
            params: params.clone(),
            result_present: result.is_some(),
            error: error.map(str::to_string),
        };

        for sink in &self.sinks {
            sink.record(&entry);
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Retained entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Entries for one user.
    pub fn entries_for_user(&self, user_id: UserId) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Count of stored entries.
    pub fn count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A tracing-based audit sink that logs entries via `tracing::info!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::info!(
            user_id = entry.user_id,
            tool = %entry.tool,
            params = %entry.params,
            result_present = entry.result_present,
            error = ?entry.error,
            "AUDIT"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn record_and_retrieve_entries() {
        let logger = AuditLogger::new();
        logger.record_audit(1, "list_tasks", &serde_json::json!({"limit": 5}), Some(&serde_json::json!({"items": []})), None);
        logger.record_audit(2, "delete_journal", &serde_json::json!({"id": 9}), None, Some("Access denied."));

        assert_eq!(logger.count(), 2);
        let entries = logger.entries();
        assert_eq!(entries[0].tool, "list_tasks");
        assert!(entries[0].result_present);
        assert!(entries[0].error.is_none());
        assert!(!entries[1].result_present);
        assert_eq!(entries[1].error.as_deref(), Some("Access denied."));
    }

    #[test]
    fn filter_by_user() {
        let logger = AuditLogger::new();
        logger.record_audit(1, "a", &serde_json::json!({}), None, None);
        logger.record_audit(2, "b", &serde_json::json!({}), None, None);
        logger.record_audit(1, "c", &serde_json::json!({}), None, None);
        let tools: Vec<_> = logger.entries_for_user(1).into_iter().map(|e| e.tool).collect();
        assert_eq!(tools, vec!["a", "c"]);
    }

    #[test]
    fn error_field_omitted_when_absent() {
        let logger = AuditLogger::new();
        logger.record_audit(1, "create_task", &serde_json::json!({"title": "x"}), Some(&serde_json::json!({"id": 1})), None);
        let json = serde_json::to_value(&logger.entries()[0]).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["params"]["title"], "x");
    }

    #[test]
    fn custom_sink_receives_entries() {
        struct TestSink {
            received: Arc<Mutex<Vec<String>>>,
        }

        impl AuditSink for TestSink {
            fn record(&self, entry: &AuditEntry) {
                self.received.lock().unwrap().push(entry.tool.clone());
            }
        }

        let received = Arc::new(Mutex::new(Vec::new()));
        let logger = AuditLogger::with_sinks(vec![Box::new(TestSink { received: received.clone() })]);
        logger.record_audit(3, "calendar_list", &serde_json::json!({}), None, None);

        assert_eq!(*received.lock().unwrap(), vec!["calendar_list".to_string()]);
    }

    #[test]
    fn recording_survives_poisoned_lock() {
        let logger = Arc::new(AuditLogger::new());
        let poisoner = logger.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock().unwrap();
            panic!("poison the audit lock");
        })
        .join();

        logger.record_audit(1, "list_notes", &serde_json::json!({}), None, None);
        assert_eq!(logger.count(), 1);
    }

    #[test]
    fn oldest_entries_are_dropped_past_capacity() {
        let logger = AuditLogger::new().with_capacity(3);
        for tool in ["a", "b", "c", "d", "e"] {
            logger.record_audit(1, tool, &serde_json::json!({}), None, None);
        }
        assert_eq!(logger.count(), 3);
        let tools: Vec<_> = logger.entries().into_iter().map(|e| e.tool).collect();
        assert_eq!(tools, vec!["c", "d", "e"]);
    }

    #[test]
    fn debug_format() {
        let logger = AuditLogger::new();
        let debug_str = format!("{logger:?}");
        assert!(debug_str.contains("entry_count"));
    }
}
