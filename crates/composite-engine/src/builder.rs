//! Fluent builder for composite graphs
//!
//! Provides a fluent API for constructing graphs programmatically.

use std::collections::BTreeMap;

use crate::types::{
    CompositeGraph, Edge, Endpoint, Metadata, NodeSpec, Settings, Variable,
};

/// Fluent builder for constructing composite graphs
///
/// # Example
///
/// ```ignore
/// let graph = CompositeBuilder::new("wf-1", "My Composite")
///     .add_node("input-1", "constant", (0.0, 0.0))
///     .with_config(serde_json::json!({"value": "Hello"}))
///     .add_node("output-1", "passthrough", (200.0, 0.0))
///     .add_edge("input-1", "output", "output-1", "input")
///     .build();
/// ```
pub struct CompositeBuilder {
    graph: CompositeGraph,
    edge_counter: usize,
}

impl CompositeBuilder {
    /// Create a new composite builder
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            graph: CompositeGraph::new(id, name),
            edge_counter: 0,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.graph.category = category.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.graph.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.graph.description = Some(description.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.graph.metadata = metadata;
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.graph.settings = Some(settings);
        self
    }

    /// Declare a variable with a default value
    pub fn variable(mut self, name: impl Into<String>, variable: Variable) -> Self {
        self.graph
            .variables
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), variable);
        self
    }

    /// Add a node to the graph
    pub fn add_node(
        mut self,
        id: impl Into<String>,
        node_type: impl Into<String>,
        position: (f64, f64),
    ) -> Self {
        self.graph
            .nodes
            .push(NodeSpec::new(id, node_type).with_position(position.0, position.1));
        self
    }

    /// Add a prepared node spec
    pub fn add_node_spec(mut self, node: NodeSpec) -> Self {
        self.graph.nodes.push(node);
        self
    }

    /// Set config on the most recently added node
    ///
    /// Must be called immediately after `add_node`.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        if let Some(node) = self.graph.nodes.last_mut() {
            node.config = config;
        }
        self
    }

    /// Add an edge between two node ports (auto-generates edge ID)
    pub fn add_edge(
        mut self,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        self.edge_counter += 1;
        let id = format!("edge-{}", self.edge_counter);
        self.graph.edges.push(Edge::new(
            id,
            Endpoint::new(source, source_port),
            Endpoint::new(target, target_port),
        ));
        self
    }

    /// Add an edge between default ports with an explicit ID
    pub fn connect(
        mut self,
        edge_id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.graph.edges.push(Edge::between(edge_id, source, target));
        self
    }

    /// Add a prepared edge
    pub fn add_edge_spec(mut self, edge: Edge) -> Self {
        self.graph.edges.push(edge);
        self
    }

    /// Build the graph without validation
    pub fn build(self) -> CompositeGraph {
        self.graph
    }
}
