//! Core types for composite graphs
//!
//! These types are the canonical ("runtime") form of a composite: edges carry
//! structured `(node, port)` endpoints, and editor-only fields ride along in
//! an untyped pass-through map that the engine copies but never reads.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Unique identifier for a port
pub type PortId = String;

/// Values keyed by port name (node inputs and outputs)
pub type PortValues = HashMap<PortId, Value>;

/// Editor-only fields carried verbatim through every transform
pub type PassThrough = Map<String, Value>;

/// Node type that is always resolvable and marks a nested graph
pub const COMPOSITE_NODE_TYPE: &str = "composite";

/// Port used when a document edge omits `sourceHandle`
pub const DEFAULT_SOURCE_PORT: &str = "output";

/// Port used when a document edge omits `targetHandle`
pub const DEFAULT_TARGET_PORT: &str = "input";

/// Opaque 2-D editor coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One side of an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub node_id: NodeId,
    pub port_id: PortId,
}

impl Endpoint {
    pub fn new(node_id: impl Into<String>, port_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            port_id: port_id.into(),
        }
    }

    /// Source endpoint on the default output port
    pub fn output_of(node_id: impl Into<String>) -> Self {
        Self::new(node_id, DEFAULT_SOURCE_PORT)
    }

    /// Target endpoint on the default input port
    pub fn input_of(node_id: impl Into<String>) -> Self {
        Self::new(node_id, DEFAULT_TARGET_PORT)
    }
}

/// A node instance in a composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Leaf type key, resolved against the registry
    #[serde(rename = "type")]
    pub node_type: String,
    /// Position in the editor, never interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Configuration handed verbatim to the leaf node (`Null` when unset)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
    /// Free-form payload attached by the editor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Editor-only fields (size, parent group, drag handle, style, class)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: PassThrough,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            position: None,
            config: Value::Null,
            data: None,
            extras: Map::new(),
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    /// Whether this node is a nested composite
    pub fn is_composite(&self) -> bool {
        self.node_type == COMPOSITE_NODE_TYPE
    }
}

/// A directed dependency between two node ports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    pub source: Endpoint,
    pub target: Endpoint,
    /// Free-form payload attached by the editor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Editor-only display fields (animated, style, label, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: PassThrough,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: Endpoint, target: Endpoint) -> Self {
        Self {
            id: id.into(),
            source,
            target,
            data: None,
            extras: Map::new(),
        }
    }

    /// Edge between the default output and input ports of two nodes
    pub fn between(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::new(id, Endpoint::output_of(source), Endpoint::input_of(target))
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Whether this edge starts and ends at the same node
    pub fn is_self_loop(&self) -> bool {
        self.source.node_id == self.target.node_id
    }
}

/// Authoring metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// ISO-8601 creation timestamp
    pub created: String,
    /// ISO-8601 modification timestamp
    pub modified: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Metadata {
    /// Metadata stamped with the current time
    pub fn now() -> Self {
        let stamp = now_timestamp();
        Self {
            created: stamp.clone(),
            modified: stamp,
            author: None,
            tags: None,
            icon: None,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.created)
    }

    pub fn modified_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.modified)
    }

    /// Bump `modified` to the current time
    pub fn touch(&mut self) {
        self.modified = now_timestamp();
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::now()
    }
}

/// Current UTC time as an RFC 3339 string
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an ISO-8601 timestamp
///
/// Accepts RFC 3339, a local date-time, or a bare date. Values without an
/// offset are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Some(Utc.from_utc_datetime(&naive).fixed_offset())
}

/// A named, typed placeholder with a default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(rename = "type")]
    pub var_type: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Variable {
    pub fn new(var_type: impl Into<String>, default: Value) -> Self {
        Self {
            var_type: var_type.into(),
            default,
            description: None,
        }
    }
}

/// Per-graph execution settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Per-node time budget in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Extra attempts after a node's first failure
    #[serde(default)]
    pub retries: u32,
    /// Allow independent nodes to run concurrently
    #[serde(default)]
    pub parallel: bool,
}

impl Settings {
    pub fn timeout_duration(&self) -> Option<std::time::Duration> {
        self.timeout.map(std::time::Duration::from_millis)
    }

    /// Total attempts a node gets before it is considered failed
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// A complete composite definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeGraph {
    /// Unique identifier for this composite
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub category: String,
    /// Document `type` field, conventionally "composite"
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub metadata: Metadata,
    /// Nodes in the graph, in authored order
    pub nodes: Vec<NodeSpec>,
    /// Edges connecting nodes, in authored order
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, Variable>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

impl CompositeGraph {
    /// Create a new empty graph
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: "general".to_string(),
            kind: COMPOSITE_NODE_TYPE.to_string(),
            version: "1.0.0".to_string(),
            description: None,
            metadata: Metadata::now(),
            nodes: Vec::new(),
            edges: Vec::new(),
            variables: None,
            settings: None,
        }
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find an edge by ID
    pub fn find_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target.node_id == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source.node_id == node_id)
    }

    /// Get the IDs of nodes that this node depends on (upstream nodes)
    pub fn get_dependencies(&self, node_id: &str) -> Vec<NodeId> {
        self.incoming_edges(node_id)
            .map(|e| e.source.node_id.clone())
            .collect()
    }

    /// Get the IDs of nodes that depend on this node (downstream nodes)
    pub fn get_dependents(&self, node_id: &str) -> Vec<NodeId> {
        self.outgoing_edges(node_id)
            .map(|e| e.target.node_id.clone())
            .collect()
    }

    /// Nodes with no outgoing edges, in authored order
    pub fn terminal_nodes(&self) -> Vec<&NodeSpec> {
        self.nodes
            .iter()
            .filter(|n| self.outgoing_edges(&n.id).next().is_none())
            .collect()
    }

    /// Settings to run with, falling back to the supplied defaults
    pub fn effective_settings(&self, defaults: &Settings) -> Settings {
        self.settings.clone().unwrap_or_else(|| defaults.clone())
    }
}
