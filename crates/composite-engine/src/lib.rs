//! Composite Engine - validated, dependency-ordered execution of node graphs
//!
//! A composite is a graph of typed processing nodes joined by edges, authored
//! in a visual editor and persisted as a flat JSON document. This crate
//! provides:
//!
//! - The canonical graph model and a fluent builder
//! - Two-stage validation (document shape, then graph rules)
//! - Lossless conversion between the document form and the graph model
//! - A fail-fast executor with per-node timeout, retries and bounded parallelism
//! - A facade tying graph, leaf registry, config and persistence together
//!
//! # Architecture
//!
//! Leaf behavior is never hard-coded. Node types resolve through a
//! [`TypeResolver`] (usually a [`NodeRegistry`]) injected into both semantic
//! validation and execution. Per-run node status lives in a caller-owned
//! [`RunStateStore`]; the graph itself is read-only while it runs.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use composite_engine::{Composite, NodeRegistry, PortValues};
//!
//! let mut registry = NodeRegistry::new();
//! registry.register_sync("echo", |_, inputs, _| Ok(inputs));
//!
//! let composite = Composite::from_document(&text, Arc::new(registry))?;
//! let outcome = composite.execute(PortValues::new()).await;
//! assert!(outcome.is_success());
//! ```

pub mod builder;
pub mod composite;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod executor;
pub mod registry;
pub mod state;
pub mod store;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::CompositeBuilder;
pub use composite::{Composite, ExecutionFailure, ExecutionOutcome, RunStatus};
pub use config::{ConfigError, EngineConfig};
pub use document::{from_document, to_document, DocumentOptions, ParsedDocument};
pub use error::{EngineError, Result};
pub use events::{ChannelEventSink, CompositeEvent, EventError, EventSink, NullEventSink, VecEventSink};
pub use executor::{ChildNode, CompositeExecutor, ExecutionOutput};
pub use registry::{LeafInfo, LeafNode, LeafNodeFactory, NodeRegistry, TypeResolver};
pub use state::{NodeRunRecord, NodeRunStatus, RunStateStore};
pub use store::{ByteStore, DirectoryStore, MemoryStore};
pub use types::{
    CompositeGraph, Edge, Endpoint, Metadata, NodeSpec, PortValues, Position, Settings, Variable,
};
pub use validation::{
    validate_document, validate_semantics, validate_structure, ErrorCode, SemanticContext,
    ValidationIssue, ValidationReport,
};
