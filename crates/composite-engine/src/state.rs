//! Per-run node state
//!
//! The graph definition is never mutated during a run. Status, attempts,
//! timestamps and outputs live here instead, keyed by node id, in a store the
//! caller owns and the executor updates through explicit calls.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{NodeId, PortValues};

/// Lifecycle of one node within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRunStatus {
    Scheduled,
    Running,
    Succeeded,
    Failed,
    /// Never admitted because the run stopped early
    Skipped,
}

impl NodeRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

/// Everything recorded about one node in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRunRecord {
    pub status: NodeRunStatus,
    /// Attempts started so far
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PortValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeRunRecord {
    fn scheduled() -> Self {
        Self {
            status: NodeRunStatus::Scheduled,
            attempts: 0,
            started_at: None,
            finished_at: None,
            output: None,
            error: None,
        }
    }

    /// Wall-clock time between first start and finish
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Caller-owned node state for a run
#[derive(Debug, Default)]
pub struct RunStateStore {
    records: RwLock<HashMap<NodeId, NodeRunRecord>>,
}

impl RunStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset `node_id` to `Scheduled`, discarding any earlier record
    pub fn schedule(&self, node_id: &str) {
        self.records
            .write()
            .insert(node_id.to_string(), NodeRunRecord::scheduled());
    }

    /// Record the start of an attempt
    pub fn mark_running(&self, node_id: &str, attempt: u32) {
        let mut records = self.records.write();
        let record = records
            .entry(node_id.to_string())
            .or_insert_with(NodeRunRecord::scheduled);
        record.status = NodeRunStatus::Running;
        record.attempts = attempt;
        record.error = None;
        if record.started_at.is_none() {
            record.started_at = Some(Utc::now());
        }
    }

    pub fn mark_succeeded(&self, node_id: &str, output: PortValues) {
        self.finish(node_id, NodeRunStatus::Succeeded, |record| {
            record.output = Some(output);
        });
    }

    pub fn mark_failed(&self, node_id: &str, error: impl Into<String>) {
        let error = error.into();
        self.finish(node_id, NodeRunStatus::Failed, |record| {
            record.error = Some(error);
        });
    }

    pub fn mark_skipped(&self, node_id: &str) {
        self.finish(node_id, NodeRunStatus::Skipped, |_| {});
    }

    fn finish(&self, node_id: &str, status: NodeRunStatus, apply: impl FnOnce(&mut NodeRunRecord)) {
        let mut records = self.records.write();
        let record = records
            .entry(node_id.to_string())
            .or_insert_with(NodeRunRecord::scheduled);
        record.status = status;
        record.finished_at = Some(Utc::now());
        apply(record);
    }

    pub fn get(&self, node_id: &str) -> Option<NodeRunRecord> {
        self.records.read().get(node_id).cloned()
    }

    pub fn status(&self, node_id: &str) -> Option<NodeRunStatus> {
        self.records.read().get(node_id).map(|r| r.status)
    }

    /// Ids of nodes currently in `status`, sorted
    pub fn nodes_with_status(&self, status: NodeRunStatus) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .records
            .read()
            .iter()
            .filter(|(_, r)| r.status == status)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Copy of every record
    pub fn snapshot(&self) -> HashMap<NodeId, NodeRunRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle() {
        let store = RunStateStore::new();
        store.schedule("a");
        assert_eq!(store.status("a"), Some(NodeRunStatus::Scheduled));

        store.mark_running("a", 1);
        store.mark_running("a", 2);
        let record = store.get("a").unwrap();
        assert_eq!(record.status, NodeRunStatus::Running);
        assert_eq!(record.attempts, 2);
        assert!(record.started_at.is_some());

        let mut output = PortValues::new();
        output.insert("output".into(), json!(1));
        store.mark_succeeded("a", output);
        let record = store.get("a").unwrap();
        assert!(record.status.is_terminal());
        assert_eq!(record.output.as_ref().unwrap()["output"], 1);
        assert!(record.duration_ms().is_some());
    }

    #[test]
    fn test_failed_and_skipped() {
        let store = RunStateStore::new();
        store.schedule("b");
        store.schedule("c");
        store.mark_running("b", 1);
        store.mark_failed("b", "boom");
        store.mark_skipped("c");

        assert_eq!(store.get("b").unwrap().error.as_deref(), Some("boom"));
        assert_eq!(store.nodes_with_status(NodeRunStatus::Skipped), vec!["c"]);
        assert_eq!(store.get("c").unwrap().attempts, 0);
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_record_serialization() {
        let store = RunStateStore::new();
        store.schedule("a");
        let json = serde_json::to_value(store.get("a").unwrap()).unwrap();
        assert_eq!(json, json!({"status": "scheduled", "attempts": 0}));
    }
}
