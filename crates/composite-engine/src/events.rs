//! Execution events
//!
//! The executor reports progress through an [`EventSink`] so hosts can stream
//! node status to an editor, a log, or a channel.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::PortValues;

/// Receiver for composite execution events
pub trait EventSink: Send + Sync {
    /// Returns an error if the event could not be delivered (e.g. channel closed)
    fn send(&self, event: CompositeEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted while a composite runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CompositeEvent {
    #[serde(rename_all = "camelCase")]
    ExecutionStarted {
        composite_id: String,
        execution_id: String,
        /// Planned topological order
        order: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    NodeStarted {
        node_id: String,
        execution_id: String,
        attempt: u32,
    },

    /// An attempt failed and another one follows
    #[serde(rename_all = "camelCase")]
    NodeRetrying {
        node_id: String,
        execution_id: String,
        attempt: u32,
        error: String,
    },

    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        node_id: String,
        execution_id: String,
        outputs: PortValues,
    },

    #[serde(rename_all = "camelCase")]
    NodeFailed {
        node_id: String,
        execution_id: String,
        attempts: u32,
        error: String,
    },

    /// Never-admitted node after a fail-fast stop
    #[serde(rename_all = "camelCase")]
    NodeSkipped {
        node_id: String,
        execution_id: String,
    },

    #[serde(rename_all = "camelCase")]
    ExecutionCompleted {
        composite_id: String,
        execution_id: String,
        duration_ms: u64,
    },

    #[serde(rename_all = "camelCase")]
    ExecutionFailed {
        composite_id: String,
        execution_id: String,
        node_id: Option<String>,
        error: String,
    },
}

impl CompositeEvent {
    /// Node this event concerns, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStarted { node_id, .. }
            | Self::NodeRetrying { node_id, .. }
            | Self::NodeCompleted { node_id, .. }
            | Self::NodeFailed { node_id, .. }
            | Self::NodeSkipped { node_id, .. } => Some(node_id),
            Self::ExecutionFailed { node_id, .. } => node_id.as_deref(),
            _ => None,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: CompositeEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// Forwards events into a tokio channel
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<CompositeEvent>,
}

impl ChannelEventSink {
    /// A sink plus the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CompositeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: CompositeEvent) -> Result<(), EventError> {
        self.sender
            .send(event)
            .map_err(|_| EventError::channel_closed())
    }
}

/// Collects events in memory, mostly for tests
pub struct VecEventSink {
    events: Mutex<Vec<CompositeEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<CompositeEvent> {
        self.events.lock().clone()
    }

    /// Ids of nodes that emitted `NodeCompleted`, in arrival order
    pub fn completed_nodes(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                CompositeEvent::NodeCompleted { node_id, .. } => Some(node_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: CompositeEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}
