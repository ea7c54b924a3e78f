//! Conversion between the runtime graph and the flat document form
//!
//! Both directions go through an intermediate `serde_json::Value` so that
//! textual syntax stays decoupled from the graph shape:
//!
//! ```text
//! text <-> Value <-> DocumentGraph <-> CompositeGraph
//! ```
//!
//! Import is tolerant (editor-injected fields are dropped) but strict about
//! shape: structural validation always runs, semantic validation runs unless
//! disabled, and every failure comes back as a typed error.

mod ingest;
mod roundtrip;
mod schema;

pub use ingest::{sanitize, Ingested};
pub use roundtrip::{check_round_trip, diff_graphs, semantically_equal};
pub use schema::{
    DocumentEdge, DocumentGraph, DocumentNode, EDGE_PASSTHROUGH, NODE_PASSTHROUGH,
};

use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::types::CompositeGraph;
use crate::validation::{
    validate_semantics, validate_structure, ErrorCode, SemanticContext, ValidationIssue,
    ValidationReport,
};

/// Options controlling document import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOptions {
    /// Run semantic validation after the structural pass
    pub validate_semantics: bool,
    /// Leaf types and strictness for semantic validation
    pub context: Option<SemanticContext>,
    /// Re-export the parsed graph and report drift as warnings
    pub check_round_trip: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            validate_semantics: true,
            context: None,
            check_round_trip: true,
        }
    }
}

impl DocumentOptions {
    pub fn with_context(mut self, context: SemanticContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Only check document shape
    pub fn structural_only() -> Self {
        Self {
            validate_semantics: false,
            context: None,
            check_round_trip: false,
        }
    }
}

/// A successfully imported document
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub graph: CompositeGraph,
    /// Non-fatal findings (coercions, unknown types, timestamp order, drift)
    pub warnings: Vec<ValidationIssue>,
}

/// Serialize a graph to pretty-printed document text
pub fn to_document(graph: &CompositeGraph) -> Result<String> {
    let value = to_document_value(graph)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Map a graph to the untyped document form
pub fn to_document_value(graph: &CompositeGraph) -> Result<Value> {
    Ok(serde_json::to_value(DocumentGraph::from_graph(graph))?)
}

/// Parse and validate document text
pub fn from_document(text: &str, options: &DocumentOptions) -> Result<ParsedDocument> {
    let raw: Value =
        serde_json::from_str(text).map_err(|e| EngineError::Parse(e.to_string()))?;
    from_document_value(raw, options)
}

/// Validate and convert an already-parsed document
pub fn from_document_value(raw: Value, options: &DocumentOptions) -> Result<ParsedDocument> {
    let Ingested {
        document,
        mut warnings,
        ..
    } = sanitize(raw);

    let structural = validate_structure(&document);
    if !structural.valid {
        log::debug!(
            "Document failed structural validation with {} issue(s)",
            structural.fields.len()
        );
        return Err(EngineError::validation(ValidationReport::from_parts(
            structural.fields,
            warnings,
        )));
    }

    let graph = match typed_graph(document) {
        Ok(graph) => graph,
        Err(issue) => {
            return Err(EngineError::validation(ValidationReport::from_parts(
                vec![issue],
                warnings,
            )))
        }
    };

    if options.validate_semantics {
        let report = validate_semantics(&graph, options.context.as_ref());
        warnings.extend(report.warnings);
        if !report.errors.is_empty() {
            log::debug!(
                "Composite '{}' failed semantic validation with {} error(s)",
                graph.id,
                report.errors.len()
            );
            return Err(EngineError::validation(ValidationReport::from_parts(
                report.errors,
                warnings,
            )));
        }
    }

    if options.check_round_trip {
        warnings.extend(check_round_trip(&graph));
    }

    Ok(ParsedDocument { graph, warnings })
}

/// Convert a structurally valid document without further validation
pub(crate) fn graph_from_value(value: Value) -> Result<CompositeGraph> {
    let document: DocumentGraph = serde_json::from_value(sanitize(value).document)?;
    Ok(document.into_graph())
}

fn typed_graph(document: Value) -> std::result::Result<CompositeGraph, ValidationIssue> {
    serde_json::from_value::<DocumentGraph>(document)
        .map(DocumentGraph::into_graph)
        .map_err(|e| {
            ValidationIssue::new(
                ErrorCode::InvalidFieldType,
                "",
                format!("Document does not match the graph model: {}", e),
            )
        })
}
