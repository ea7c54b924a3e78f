//! Composite facade
//!
//! A [`Composite`] owns one canonical graph plus the resolver used to turn
//! its node types into executable leaves. It validates before every run and
//! every save, resolves children (recursing into nested composites), and
//! hands them to the [`CompositeExecutor`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::document::{self, DocumentOptions, ParsedDocument};
use crate::error::{EngineError, Result};
use crate::events::{EventSink, NullEventSink};
use crate::executor::{ChildNode, CompositeExecutor, ExecutionOutput};
use crate::registry::{LeafNode, TypeResolver};
use crate::state::RunStateStore;
use crate::store::ByteStore;
use crate::types::{CompositeGraph, Metadata, NodeId, NodeSpec, PortValues, COMPOSITE_NODE_TYPE};
use crate::validation::{
    validate_document, ErrorCode, SemanticContext, ValidationIssue, ValidationReport,
};

/// Overall result of [`Composite::execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

/// Why a run did not succeed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailure {
    /// Stable error code, e.g. `NODE_FAILED` or `VALIDATION_FAILED`
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Validation errors when the graph was rejected before running
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationIssue>,
}

impl From<&EngineError> for ExecutionFailure {
    fn from(error: &EngineError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            node_id: error.node_id().map(str::to_string),
            errors: error
                .report()
                .map(|report| report.errors.clone())
                .unwrap_or_default(),
        }
    }
}

/// Result of one composite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub status: RunStatus,
    pub execution_id: String,
    /// Union of terminal node outputs
    pub outputs: PortValues,
    pub terminal_outputs: BTreeMap<NodeId, PortValues>,
    /// Planned topological order (empty if the run never started)
    pub order: Vec<NodeId>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,
}

impl ExecutionOutcome {
    fn success(execution_id: String, output: ExecutionOutput) -> Self {
        Self {
            status: RunStatus::Success,
            execution_id,
            outputs: output.outputs,
            terminal_outputs: output.terminal_outputs,
            order: output.order,
            duration_ms: output.duration_ms,
            failure: None,
        }
    }

    fn failure(execution_id: String, error: &EngineError, duration_ms: u64) -> Self {
        Self {
            status: RunStatus::Failure,
            execution_id,
            outputs: PortValues::new(),
            terminal_outputs: BTreeMap::new(),
            order: Vec::new(),
            duration_ms,
            failure: Some(ExecutionFailure::from(error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Node that caused the failure, if one did
    pub fn failed_node(&self) -> Option<&str> {
        self.failure.as_ref().and_then(|f| f.node_id.as_deref())
    }

    pub fn error_code(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.code.as_str())
    }
}

/// A validated graph bound to a leaf resolver
#[derive(Clone)]
pub struct Composite {
    graph: CompositeGraph,
    resolver: Arc<dyn TypeResolver>,
    config: EngineConfig,
    event_sink: Arc<dyn EventSink>,
    warnings: Vec<ValidationIssue>,
}

impl std::fmt::Debug for Composite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composite")
            .field("id", &self.graph.id)
            .field("nodes", &self.graph.nodes.len())
            .field("edges", &self.graph.edges.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Composite {
    /// Wrap a graph without validating it
    pub fn new(graph: CompositeGraph, resolver: Arc<dyn TypeResolver>) -> Self {
        Self {
            graph,
            resolver,
            config: EngineConfig::default(),
            event_sink: Arc::new(NullEventSink),
            warnings: Vec::new(),
        }
    }

    /// Wrap a graph, rejecting it if validation finds errors
    pub fn from_definition(graph: CompositeGraph, resolver: Arc<dyn TypeResolver>) -> Result<Self> {
        Self::from_definition_with_config(graph, resolver, EngineConfig::default())
    }

    pub fn from_definition_with_config(
        graph: CompositeGraph,
        resolver: Arc<dyn TypeResolver>,
        config: EngineConfig,
    ) -> Result<Self> {
        let mut composite = Self::new(graph, resolver).with_config(config);
        let report = composite.validate();
        if !report.valid {
            log::warn!(
                "Composite '{}' rejected: {} validation error(s)",
                composite.graph.id,
                report.errors.len()
            );
            return Err(EngineError::validation(report));
        }
        composite.warnings = report.warnings;
        Ok(composite)
    }

    /// Parse document text into a composite
    pub fn from_document(text: &str, resolver: Arc<dyn TypeResolver>) -> Result<Self> {
        Self::from_document_with_config(text, resolver, EngineConfig::default())
    }

    pub fn from_document_with_config(
        text: &str,
        resolver: Arc<dyn TypeResolver>,
        config: EngineConfig,
    ) -> Result<Self> {
        let options = document_options(resolver.as_ref(), &config);
        let parsed = document::from_document(text, &options)?;
        Ok(Self::from_parsed(parsed, resolver, config))
    }

    fn from_parsed(parsed: ParsedDocument, resolver: Arc<dyn TypeResolver>, config: EngineConfig) -> Self {
        for warning in &parsed.warnings {
            log::warn!("Composite '{}': {}", parsed.graph.id, warning);
        }
        Self {
            graph: parsed.graph,
            resolver,
            config,
            event_sink: Arc::new(NullEventSink),
            warnings: parsed.warnings,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_sink(mut self, event_sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    pub fn id(&self) -> &str {
        &self.graph.id
    }

    pub fn graph(&self) -> &CompositeGraph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Non-fatal findings from the last load or validation
    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    /// Structural and semantic validation against the current resolver
    ///
    /// Nested composite definitions are validated too, with their issue
    /// paths prefixed by `nodes[i].config.definition`.
    pub fn validate(&self) -> ValidationReport {
        let context = SemanticContext::from_resolver(self.resolver.as_ref(), self.config.strict_mode);
        match document::to_document_value(&self.graph) {
            Ok(value) => {
                let mut report = validate_document(&value, Some(&context));
                report.merge(validate_nested(&value, &context, ""));
                report
            }
            Err(e) => ValidationReport::from_parts(
                vec![ValidationIssue::new(ErrorCode::InvalidInputType, "", e.to_string())],
                Vec::new(),
            ),
        }
    }

    /// Validate and run the graph
    ///
    /// Never returns an error; every failure is described by the outcome.
    pub async fn execute(&self, inputs: PortValues) -> ExecutionOutcome {
        self.execute_with_state(inputs, &RunStateStore::new()).await
    }

    /// Like [`execute`](Self::execute), recording node state into `state`
    pub async fn execute_with_state(&self, inputs: PortValues, state: &RunStateStore) -> ExecutionOutcome {
        let executor = self.executor();
        let execution_id = executor.execution_id().to_string();
        let start = std::time::Instant::now();

        match self.run(&executor, &inputs, state).await {
            Ok(output) => ExecutionOutcome::success(execution_id, output),
            Err(e) => {
                ExecutionOutcome::failure(execution_id, &e, start.elapsed().as_millis() as u64)
            }
        }
    }

    /// Validate and run, surfacing failures as errors
    pub async fn try_execute(&self, inputs: PortValues, state: &RunStateStore) -> Result<ExecutionOutput> {
        self.run(&self.executor(), &inputs, state).await
    }

    fn executor(&self) -> CompositeExecutor {
        CompositeExecutor::new(self.graph.id.clone())
            .with_event_sink(self.event_sink.clone())
            .with_max_concurrency(self.config.max_concurrency)
    }

    async fn run(
        &self,
        executor: &CompositeExecutor,
        inputs: &PortValues,
        state: &RunStateStore,
    ) -> Result<ExecutionOutput> {
        let report = self.validate();
        if !report.valid {
            log::warn!(
                "Refusing to execute composite '{}': {} validation error(s)",
                self.graph.id,
                report.errors.len()
            );
            return Err(EngineError::validation(report));
        }

        let children = self.resolve_children()?;
        let settings = self.config.settings_for(&self.graph);
        executor
            .execute(&children, &self.graph.edges, inputs, &settings, state)
            .await
    }

    /// Pair every node with an executable instance
    fn resolve_children(&self) -> Result<Vec<ChildNode>> {
        self.graph
            .nodes
            .iter()
            .map(|spec| {
                let instance = self.instantiate(spec).map_err(|e| e.for_node(&spec.id))?;
                Ok(ChildNode::new(spec.clone(), instance))
            })
            .collect()
    }

    fn instantiate(&self, spec: &NodeSpec) -> Result<Arc<dyn LeafNode>> {
        if spec.is_composite() {
            let nested = self.nested(spec)?;
            log::debug!(
                "Node '{}' runs nested composite '{}'",
                spec.id,
                nested.graph.id
            );
            return Ok(Arc::new(CompositeLeaf { composite: nested }));
        }

        let factory =
            self.resolver
                .resolve(&spec.node_type)
                .ok_or_else(|| EngineError::UnknownNodeType {
                    node_id: spec.id.clone(),
                    node_type: spec.node_type.clone(),
                })?;
        factory.create(&spec.config)
    }

    /// Build the composite stored under a node's `config.definition`
    ///
    /// The definition may be an inline document object or document text.
    fn nested(&self, spec: &NodeSpec) -> Result<Composite> {
        let definition = spec.config.get("definition").ok_or_else(|| {
            EngineError::InvalidConfig(format!(
                "Composite node '{}' has no config.definition",
                spec.id
            ))
        })?;

        let options = document_options(self.resolver.as_ref(), &self.config);
        let parsed = match definition {
            Value::String(text) => document::from_document(text, &options)?,
            other => document::from_document_value(other.clone(), &options)?,
        };

        Ok(Self::from_parsed(parsed, self.resolver.clone(), self.config.clone())
            .with_event_sink(self.event_sink.clone()))
    }

    /// Serialize to document text
    pub fn to_document(&self) -> Result<String> {
        document::to_document(&self.graph)
    }

    /// Copy with a new identity and fresh timestamps
    pub fn clone_as(&self, new_id: impl Into<String>, new_name: impl Into<String>) -> Composite {
        let mut graph = self.graph.clone();
        graph.id = new_id.into();
        graph.name = new_name.into();
        let fresh = Metadata::now();
        graph.metadata.created = fresh.created;
        graph.metadata.modified = fresh.modified;

        Composite {
            graph,
            resolver: self.resolver.clone(),
            config: self.config.clone(),
            event_sink: self.event_sink.clone(),
            warnings: Vec::new(),
        }
    }

    /// Combine two composites into a new, validated one
    ///
    /// This graph keeps its identity. Nodes and edges from `other` whose ids
    /// collide are re-keyed as `"{other.id}.{id}"` and its edges follow the
    /// renamed nodes. Variables and tags are unioned with this side winning;
    /// settings come from this side when set.
    pub fn merge(&self, other: &Composite) -> Result<Composite> {
        let mut graph = self.graph.clone();
        let prefix = &other.graph.id;

        let mut node_ids: HashSet<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        let mut renamed: HashMap<String, String> = HashMap::new();
        for node in &other.graph.nodes {
            let mut node = node.clone();
            if node_ids.contains(&node.id) {
                let new_id = format!("{}.{}", prefix, node.id);
                renamed.insert(node.id.clone(), new_id.clone());
                node.id = new_id;
            }
            node_ids.insert(node.id.clone());
            graph.nodes.push(node);
        }

        let mut edge_ids: HashSet<String> = graph.edges.iter().map(|e| e.id.clone()).collect();
        for edge in &other.graph.edges {
            let mut edge = edge.clone();
            if edge_ids.contains(&edge.id) {
                edge.id = format!("{}.{}", prefix, edge.id);
            }
            if let Some(id) = renamed.get(edge.source.node_id.as_str()) {
                edge.source.node_id = id.clone();
            }
            if let Some(id) = renamed.get(edge.target.node_id.as_str()) {
                edge.target.node_id = id.clone();
            }
            edge_ids.insert(edge.id.clone());
            graph.edges.push(edge);
        }

        if let Some(theirs) = &other.graph.variables {
            let ours = graph.variables.get_or_insert_with(BTreeMap::new);
            for (name, variable) in theirs {
                ours.entry(name.clone()).or_insert_with(|| variable.clone());
            }
        }

        if let Some(theirs) = &other.graph.metadata.tags {
            let ours = graph.metadata.tags.get_or_insert_with(Vec::new);
            for tag in theirs {
                if !ours.contains(tag) {
                    ours.push(tag.clone());
                }
            }
        }

        if graph.settings.is_none() {
            graph.settings = other.graph.settings.clone();
        }
        graph.metadata.touch();

        log::debug!(
            "Merged '{}' into '{}' ({} node(s) re-keyed)",
            other.graph.id,
            self.graph.id,
            renamed.len()
        );

        Ok(
            Self::from_definition_with_config(graph, self.resolver.clone(), self.config.clone())?
                .with_event_sink(self.event_sink.clone()),
        )
    }

    /// Validate and write the document under `key` (the graph id by default)
    ///
    /// Returns the key written.
    pub fn save(&self, store: &dyn ByteStore, key: Option<&str>) -> Result<String> {
        let report = self.validate();
        if !report.valid {
            return Err(EngineError::validation(report));
        }

        let key = key.unwrap_or(&self.graph.id).to_string();
        let text = self.to_document()?;
        store.write(&key, text.as_bytes())?;
        log::info!("Saved composite '{}' as '{}'", self.graph.id, key);
        Ok(key)
    }

    /// Read and parse the document stored under `key`
    pub fn load(store: &dyn ByteStore, key: &str, resolver: Arc<dyn TypeResolver>) -> Result<Self> {
        let bytes = store.read(key)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| EngineError::Parse(format!("'{}' is not UTF-8: {}", key, e)))?;
        Self::from_document(&text, resolver)
    }
}

fn document_options(resolver: &dyn TypeResolver, config: &EngineConfig) -> DocumentOptions {
    DocumentOptions {
        validate_semantics: true,
        context: Some(SemanticContext::from_resolver(resolver, config.strict_mode)),
        check_round_trip: config.check_round_trip,
    }
}

/// Validate every nested definition under `document`'s composite nodes
fn validate_nested(document: &Value, context: &SemanticContext, prefix: &str) -> ValidationReport {
    let mut report = ValidationReport::ok();
    let Some(nodes) = document.get("nodes").and_then(Value::as_array) else {
        return report;
    };

    for (index, node) in nodes.iter().enumerate() {
        if node.get("type").and_then(Value::as_str) != Some(COMPOSITE_NODE_TYPE) {
            continue;
        }
        let Some(definition) = node.get("config").and_then(|c| c.get("definition")) else {
            continue;
        };
        let path = format!("{}nodes[{}].config.definition", prefix, index);

        let parsed;
        let inner = match definition {
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(value) => {
                    parsed = value;
                    &parsed
                }
                Err(e) => {
                    report.merge(ValidationReport::from_parts(
                        vec![ValidationIssue::new(
                            ErrorCode::InvalidInputType,
                            path,
                            format!("Nested definition is not valid JSON: {}", e),
                        )],
                        Vec::new(),
                    ));
                    continue;
                }
            },
            other => other,
        };

        let mut nested = validate_document(inner, Some(context));
        for issue in nested.errors.iter_mut().chain(nested.warnings.iter_mut()) {
            issue.path = if issue.path.is_empty() {
                path.clone()
            } else {
                format!("{}.{}", path, issue.path)
            };
        }
        report.merge(nested);
        report.merge(validate_nested(inner, context, &format!("{}.", path)));
    }
    report
}

/// A nested composite running as a single leaf
struct CompositeLeaf {
    composite: Composite,
}

#[async_trait]
impl LeafNode for CompositeLeaf {
    async fn execute(&self, node_id: &str, inputs: PortValues, _config: &Value) -> Result<PortValues> {
        log::debug!("Entering nested composite '{}' at node '{}'", self.composite.id(), node_id);
        let output = self.composite.try_execute(inputs, &RunStateStore::new()).await?;
        Ok(output.outputs)
    }
}
