//! Composite executor
//!
//! Runs already-resolved child nodes in dependency order:
//!
//! 1. Build the plan (unknown endpoints and cycles fail before anything runs)
//! 2. Admit ready nodes, lowest original index first, up to the concurrency
//!    limit (1 when `parallel` is off)
//! 3. Run each attempt under the per-node timeout, retrying failures
//! 4. On the first terminal failure stop admitting, drain in-flight nodes,
//!    discard their outputs and mark never-admitted nodes skipped
//!
//! Node futures are polled concurrently on the caller's task; nothing is
//! spawned.

mod plan;

pub use plan::{build_plan, ExecutionPlan};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::events::{CompositeEvent, EventSink, NullEventSink};
use crate::registry::LeafNode;
use crate::state::{NodeRunStatus, RunStateStore};
use crate::types::{Edge, NodeId, NodeSpec, PortValues, Settings};

/// A node paired with the leaf instance that will run it
#[derive(Clone)]
pub struct ChildNode {
    pub spec: NodeSpec,
    pub instance: Arc<dyn LeafNode>,
}

impl ChildNode {
    pub fn new(spec: NodeSpec, instance: Arc<dyn LeafNode>) -> Self {
        Self { spec, instance }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }
}

impl std::fmt::Debug for ChildNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildNode")
            .field("id", &self.spec.id)
            .field("type", &self.spec.node_type)
            .finish()
    }
}

/// Result of a successful run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutput {
    /// Union of terminal node outputs; later nodes in execution order win
    pub outputs: PortValues,
    /// Outputs of each terminal node
    pub terminal_outputs: BTreeMap<NodeId, PortValues>,
    /// Planned topological order
    pub order: Vec<NodeId>,
    pub nodes_executed: usize,
    pub duration_ms: u64,
}

/// Dependency-ordered runner for one composite
pub struct CompositeExecutor {
    composite_id: String,
    execution_id: String,
    event_sink: Arc<dyn EventSink>,
    max_concurrency: Option<usize>,
}

impl CompositeExecutor {
    pub fn new(composite_id: impl Into<String>) -> Self {
        Self {
            composite_id: composite_id.into(),
            execution_id: format!("exec-{}", uuid::Uuid::new_v4()),
            event_sink: Arc::new(NullEventSink),
            max_concurrency: None,
        }
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    pub fn with_event_sink(mut self, event_sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    /// Cap on concurrently running nodes in parallel mode (unbounded if unset)
    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Run `children` connected by `edges`
    ///
    /// `inputs` feed every child without incoming edges. Node status is
    /// written to `state` as the run progresses.
    pub async fn execute(
        &self,
        children: &[ChildNode],
        edges: &[Edge],
        inputs: &PortValues,
        settings: &Settings,
        state: &RunStateStore,
    ) -> Result<ExecutionOutput> {
        let start_time = Instant::now();
        let node_ids: Vec<&str> = children.iter().map(ChildNode::id).collect();

        let plan = match build_plan(&node_ids, edges) {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("Composite '{}' cannot run: {}", self.composite_id, e);
                self.emit_execution_failed(None, &e.to_string());
                return Err(e);
            }
        };

        let order: Vec<NodeId> = plan.order.iter().map(|&i| node_ids[i].to_string()).collect();
        for id in &node_ids {
            state.schedule(id);
        }

        let limit = if settings.parallel {
            self.max_concurrency.unwrap_or(children.len()).max(1)
        } else {
            1
        };

        log::info!(
            "Executing composite '{}' ({} nodes, parallel: {}, limit: {})",
            self.composite_id,
            children.len(),
            settings.parallel,
            limit
        );
        self.emit_execution_started(&order);

        let mut remaining: Vec<usize> = plan.predecessors.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = (0..children.len()).filter(|&i| remaining[i] == 0).collect();
        let mut outputs: HashMap<usize, PortValues> = HashMap::new();
        let mut in_flight = FuturesUnordered::new();
        let mut failure: Option<EngineError> = None;

        loop {
            if failure.is_none() {
                while in_flight.len() < limit {
                    let Some(index) = ready.pop_first() else {
                        break;
                    };
                    let node_inputs = self.collect_inputs(index, &plan, edges, children, &outputs, inputs);
                    let child = &children[index];
                    in_flight.push(async move {
                        (index, self.run_node(child, node_inputs, settings, state).await)
                    });
                }
            }

            let Some((index, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(node_outputs) if failure.is_none() => {
                    for &succ in &plan.successors[index] {
                        remaining[succ] -= 1;
                        if remaining[succ] == 0 {
                            ready.insert(succ);
                        }
                    }
                    outputs.insert(index, node_outputs);
                }
                Ok(_) => {
                    log::debug!(
                        "Discarding output of '{}' after run failure",
                        children[index].id()
                    );
                }
                Err(e) => {
                    if failure.is_none() {
                        log::error!(
                            "Composite '{}' failed at node '{}': {}",
                            self.composite_id,
                            children[index].id(),
                            e
                        );
                        failure = Some(e);
                    } else {
                        log::warn!("Additional failure while draining: {}", e);
                    }
                }
            }
        }

        if let Some(error) = failure {
            for id in &node_ids {
                if state.status(id) == Some(NodeRunStatus::Scheduled) {
                    state.mark_skipped(id);
                    self.emit_node_skipped(id);
                }
            }
            self.emit_execution_failed(error.node_id(), &error.to_string());
            return Err(error);
        }

        let mut merged = PortValues::new();
        let mut terminal_outputs = BTreeMap::new();
        for &index in &plan.order {
            if !plan.is_terminal(index) {
                continue;
            }
            if let Some(node_outputs) = outputs.get(&index) {
                merged.extend(node_outputs.iter().map(|(k, v)| (k.clone(), v.clone())));
                terminal_outputs.insert(node_ids[index].to_string(), node_outputs.clone());
            }
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        log::info!(
            "Composite '{}' completed {} nodes in {}ms",
            self.composite_id,
            outputs.len(),
            duration_ms
        );
        self.emit_execution_completed(duration_ms);

        Ok(ExecutionOutput {
            outputs: merged,
            terminal_outputs,
            order,
            nodes_executed: outputs.len(),
            duration_ms,
        })
    }

    /// Map upstream output ports onto this node's input ports
    ///
    /// Several edges into one port collect into an array in edge order.
    fn collect_inputs(
        &self,
        index: usize,
        plan: &ExecutionPlan,
        edges: &[Edge],
        children: &[ChildNode],
        outputs: &HashMap<usize, PortValues>,
        composite_inputs: &PortValues,
    ) -> PortValues {
        let incoming = &plan.incoming[index];
        if incoming.is_empty() {
            return composite_inputs.clone();
        }

        let mut collected: Vec<(String, Vec<Value>)> = Vec::new();
        for &edge_index in incoming {
            let edge = &edges[edge_index];
            let value = children
                .iter()
                .position(|c| c.spec.id == edge.source.node_id)
                .and_then(|source| outputs.get(&source))
                .and_then(|out| out.get(&edge.source.port_id));

            let Some(value) = value else {
                log::debug!(
                    "Edge '{}': '{}' produced no '{}' output",
                    edge.id,
                    edge.source.node_id,
                    edge.source.port_id
                );
                continue;
            };

            match collected.iter_mut().find(|(port, _)| *port == edge.target.port_id) {
                Some((_, values)) => values.push(value.clone()),
                None => collected.push((edge.target.port_id.clone(), vec![value.clone()])),
            }
        }

        collected
            .into_iter()
            .map(|(port, mut values)| {
                let value = if values.len() == 1 {
                    values.remove(0)
                } else {
                    Value::Array(values)
                };
                (port, value)
            })
            .collect()
    }

    /// Run one node to completion, honoring the retry budget
    async fn run_node(
        &self,
        child: &ChildNode,
        inputs: PortValues,
        settings: &Settings,
        state: &RunStateStore,
    ) -> Result<PortValues> {
        let node_id = child.id();
        let max_attempts = settings.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            state.mark_running(node_id, attempt);
            self.emit_node_started(node_id, attempt);

            match self
                .run_attempt(child, inputs.clone(), settings.timeout_duration())
                .await
            {
                Ok(outputs) => {
                    state.mark_succeeded(node_id, outputs.clone());
                    self.emit_node_completed(node_id, &outputs);
                    return Ok(outputs);
                }
                Err(e) => {
                    if attempt < max_attempts {
                        log::warn!(
                            "Node '{}' attempt {}/{} failed, retrying: {}",
                            node_id,
                            attempt,
                            max_attempts,
                            e
                        );
                        self.emit_node_retrying(node_id, attempt, &e.to_string());
                    }
                    last_error = Some(e);
                }
            }
        }

        let source = last_error.unwrap_or_else(|| EngineError::failed("node made no attempts"));
        state.mark_failed(node_id, source.to_string());
        self.emit_node_failed(node_id, max_attempts, &source.to_string());

        Err(EngineError::NodeFailed {
            node_id: node_id.to_string(),
            attempts: max_attempts,
            source: Box::new(source),
        })
    }

    /// One bounded attempt; panics and timeouts become errors
    async fn run_attempt(
        &self,
        child: &ChildNode,
        inputs: PortValues,
        timeout: Option<Duration>,
    ) -> Result<PortValues> {
        let node_id = child.id();
        let attempt = AssertUnwindSafe(child.instance.execute(node_id, inputs, &child.spec.config))
            .catch_unwind();

        let caught = match timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(caught) => caught,
                Err(_) => {
                    return Err(EngineError::Timeout {
                        node_id: node_id.to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
            None => attempt.await,
        };

        caught.unwrap_or_else(|panic| {
            Err(EngineError::failed(format!(
                "Node '{}' panicked: {}",
                node_id,
                panic_message(panic.as_ref())
            )))
        })
    }

    // Event emission helpers; delivery failures never affect the run

    fn emit_execution_started(&self, order: &[NodeId]) {
        let _ = self.event_sink.send(CompositeEvent::ExecutionStarted {
            composite_id: self.composite_id.clone(),
            execution_id: self.execution_id.clone(),
            order: order.to_vec(),
        });
    }

    fn emit_execution_completed(&self, duration_ms: u64) {
        let _ = self.event_sink.send(CompositeEvent::ExecutionCompleted {
            composite_id: self.composite_id.clone(),
            execution_id: self.execution_id.clone(),
            duration_ms,
        });
    }

    fn emit_execution_failed(&self, node_id: Option<&str>, error: &str) {
        let _ = self.event_sink.send(CompositeEvent::ExecutionFailed {
            composite_id: self.composite_id.clone(),
            execution_id: self.execution_id.clone(),
            node_id: node_id.map(str::to_string),
            error: error.to_string(),
        });
    }

    fn emit_node_started(&self, node_id: &str, attempt: u32) {
        let _ = self.event_sink.send(CompositeEvent::NodeStarted {
            node_id: node_id.to_string(),
            execution_id: self.execution_id.clone(),
            attempt,
        });
    }

    fn emit_node_retrying(&self, node_id: &str, attempt: u32, error: &str) {
        let _ = self.event_sink.send(CompositeEvent::NodeRetrying {
            node_id: node_id.to_string(),
            execution_id: self.execution_id.clone(),
            attempt,
            error: error.to_string(),
        });
    }

    fn emit_node_completed(&self, node_id: &str, outputs: &PortValues) {
        let _ = self.event_sink.send(CompositeEvent::NodeCompleted {
            node_id: node_id.to_string(),
            execution_id: self.execution_id.clone(),
            outputs: outputs.clone(),
        });
    }

    fn emit_node_failed(&self, node_id: &str, attempts: u32, error: &str) {
        let _ = self.event_sink.send(CompositeEvent::NodeFailed {
            node_id: node_id.to_string(),
            execution_id: self.execution_id.clone(),
            attempts,
            error: error.to_string(),
        });
    }

    fn emit_node_skipped(&self, node_id: &str) {
        let _ = self.event_sink.send(CompositeEvent::NodeSkipped {
            node_id: node_id.to_string(),
            execution_id: self.execution_id.clone(),
        });
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
