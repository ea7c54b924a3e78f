//! Graph-level rule checking
//!
//! Every rule runs independently; errors from one rule never hide errors
//! from another.

use std::collections::{BTreeSet, HashSet};

use serde_json::json;

use super::report::{ErrorCode, ValidationIssue, ValidationReport};
use super::suggest::suggest_type;
use crate::registry::TypeResolver;
use crate::types::{parse_timestamp, CompositeGraph, COMPOSITE_NODE_TYPE};

/// Caller-supplied leniency context for semantic validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SemanticContext {
    /// Resolvable leaf types; type checking is skipped when `None`
    pub available_types: Option<BTreeSet<String>>,
    /// Unknown types are errors instead of warnings
    pub strict_mode: bool,
}

impl SemanticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            available_types: Some(types.into_iter().map(Into::into).collect()),
            strict_mode: false,
        }
    }

    /// Snapshot the types a resolver currently knows
    pub fn from_resolver(resolver: &dyn TypeResolver, strict_mode: bool) -> Self {
        Self {
            available_types: Some(resolver.known_types().into_iter().collect()),
            strict_mode,
        }
    }

    pub fn strict(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }
}

/// Validate graph invariants
///
/// Returns every error and warning found (not just the first).
pub fn validate_semantics(
    graph: &CompositeGraph,
    context: Option<&SemanticContext>,
) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    validate_node_uniqueness(graph, &mut errors);
    validate_edge_uniqueness(graph, &mut errors);
    validate_edge_references(graph, &mut errors);

    if let Some(ctx) = context {
        validate_node_types(graph, ctx, &mut errors, &mut warnings);
    }

    validate_metadata(graph, &mut errors, &mut warnings);

    ValidationReport::from_parts(errors, warnings)
}

/// Flag the second and later occurrence of each node id
fn validate_node_uniqueness(graph: &CompositeGraph, errors: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    for (index, node) in graph.nodes.iter().enumerate() {
        if !seen.insert(node.id.as_str()) {
            errors.push(
                ValidationIssue::new(
                    ErrorCode::DuplicateNodeId,
                    format!("nodes[{}].id", index),
                    format!("Duplicate node id '{}'", node.id),
                )
                .with_data(json!({ "index": index, "id": node.id })),
            );
        }
    }
}

/// Flag the second and later occurrence of each edge id
fn validate_edge_uniqueness(graph: &CompositeGraph, errors: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    for (index, edge) in graph.edges.iter().enumerate() {
        if !seen.insert(edge.id.as_str()) {
            errors.push(
                ValidationIssue::new(
                    ErrorCode::DuplicateEdgeId,
                    format!("edges[{}].id", index),
                    format!("Duplicate edge id '{}'", edge.id),
                )
                .with_data(json!({ "index": index, "id": edge.id })),
            );
        }
    }
}

/// Check that every edge endpoint names an existing node
fn validate_edge_references(graph: &CompositeGraph, errors: &mut Vec<ValidationIssue>) {
    let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();

    for (index, edge) in graph.edges.iter().enumerate() {
        if !node_ids.contains(edge.source.node_id.as_str()) {
            errors.push(
                ValidationIssue::new(
                    ErrorCode::InvalidSourceNode,
                    format!("edges[{}].source", index),
                    format!(
                        "Edge '{}' references unknown source node '{}'",
                        edge.id, edge.source.node_id
                    ),
                )
                .with_data(json!({ "index": index, "edgeId": edge.id, "nodeId": edge.source.node_id })),
            );
        }
        if !node_ids.contains(edge.target.node_id.as_str()) {
            errors.push(
                ValidationIssue::new(
                    ErrorCode::InvalidTargetNode,
                    format!("edges[{}].target", index),
                    format!(
                        "Edge '{}' references unknown target node '{}'",
                        edge.id, edge.target.node_id
                    ),
                )
                .with_data(json!({ "index": index, "edgeId": edge.id, "nodeId": edge.target.node_id })),
            );
        }
    }
}

/// Check node types against the available set
fn validate_node_types(
    graph: &CompositeGraph,
    ctx: &SemanticContext,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let Some(available) = &ctx.available_types else {
        return;
    };
    let fail_all = ctx.strict_mode && available.is_empty();

    for (index, node) in graph.nodes.iter().enumerate() {
        if !fail_all && (node.node_type == COMPOSITE_NODE_TYPE || available.contains(&node.node_type)) {
            continue;
        }

        let suggestion = suggest_type(&node.node_type, available);
        let mut message = format!("Unknown node type '{}' on node '{}'", node.node_type, node.id);
        if let Some(s) = &suggestion {
            message.push_str(&format!(". Did you mean '{}'?", s));
        }

        let mut data = json!({ "index": index, "nodeId": node.id, "type": node.node_type });
        if let Some(s) = suggestion {
            data["suggestion"] = json!(s);
        }

        let issue = ValidationIssue::new(
            ErrorCode::UnknownNodeType,
            format!("nodes[{}].type", index),
            message,
        )
        .with_data(data);

        if ctx.strict_mode {
            errors.push(issue);
        } else {
            warnings.push(issue);
        }
    }
}

fn validate_metadata(
    graph: &CompositeGraph,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let created = parse_timestamp(&graph.metadata.created);
    let modified = parse_timestamp(&graph.metadata.modified);

    if created.is_none() {
        errors.push(ValidationIssue::new(
            ErrorCode::InvalidTimestamp,
            "metadata.created",
            format!("Invalid timestamp '{}'", graph.metadata.created),
        ));
    }
    if modified.is_none() {
        errors.push(ValidationIssue::new(
            ErrorCode::InvalidTimestamp,
            "metadata.modified",
            format!("Invalid timestamp '{}'", graph.metadata.modified),
        ));
    }

    if let (Some(created), Some(modified)) = (created, modified) {
        if created > modified {
            warnings.push(ValidationIssue::new(
                ErrorCode::TimestampOrder,
                "metadata",
                format!(
                    "Created timestamp '{}' is later than modified timestamp '{}'",
                    graph.metadata.created, graph.metadata.modified
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CompositeBuilder;
    use crate::types::{Edge, Metadata, NodeSpec};

    fn stamped(created: &str, modified: &str) -> Metadata {
        Metadata {
            created: created.into(),
            modified: modified.into(),
            author: None,
            tags: None,
            icon: None,
        }
    }

    fn base() -> CompositeBuilder {
        CompositeBuilder::new("t1", "T")
            .metadata(stamped("2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z"))
    }

    #[test]
    fn test_valid_graph() {
        let graph = base()
            .add_node("n1", "code", (0.0, 0.0))
            .add_node("n2", "transform", (1.0, 0.0))
            .connect("e1", "n1", "n2")
            .build();
        let report = validate_semantics(&graph, None);
        assert!(report.valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_node_per_repeat() {
        let graph = base()
            .add_node("a", "code", (0.0, 0.0))
            .add_node("b", "code", (0.0, 0.0))
            .add_node("a", "code", (0.0, 0.0))
            .add_node("a", "code", (0.0, 0.0))
            .build();

        let report = validate_semantics(&graph, None);
        let dups: Vec<_> = report
            .errors
            .iter()
            .filter(|e| e.code == ErrorCode::DuplicateNodeId)
            .collect();
        assert_eq!(dups.len(), 2);
        assert_eq!(dups[0].data.as_ref().unwrap()["index"], 2);
        assert_eq!(dups[1].data.as_ref().unwrap()["index"], 3);
        assert_eq!(dups[0].path, "nodes[2].id");
    }

    #[test]
    fn test_duplicate_edge_ids() {
        let graph = base()
            .add_node("a", "code", (0.0, 0.0))
            .add_node("b", "code", (0.0, 0.0))
            .connect("e1", "a", "b")
            .connect("e1", "b", "a")
            .build();

        let report = validate_semantics(&graph, None);
        assert_eq!(report.error_codes(), vec![ErrorCode::DuplicateEdgeId]);
        assert_eq!(report.errors[0].data.as_ref().unwrap()["index"], 1);
    }

    #[test]
    fn test_edge_references() {
        let graph = base()
            .add_node("n1", "code", (0.0, 0.0))
            .add_node("n2", "transform", (0.0, 0.0))
            .connect("e1", "missing", "n2")
            .connect("e2", "n1", "gone")
            .connect("loop", "n1", "n1")
            .build();

        let report = validate_semantics(&graph, None);
        assert_eq!(
            report.error_codes(),
            vec![ErrorCode::InvalidSourceNode, ErrorCode::InvalidTargetNode]
        );
        assert_eq!(report.errors[0].path, "edges[0].source");
        assert_eq!(report.errors[1].path, "edges[1].target");
        assert!(report.has_critical_errors());
    }

    #[test]
    fn test_self_loop_is_valid() {
        let mut graph = base().add_node("n1", "code", (0.0, 0.0)).build();
        graph.edges.push(Edge::between("self", "n1", "n1"));
        assert!(validate_semantics(&graph, None).valid);
    }

    #[test]
    fn test_unknown_type_warning_with_suggestion() {
        let graph = base()
            .add_node("n1", "jsonFilter", (0.0, 0.0))
            .add_node("n2", "composite", (0.0, 0.0))
            .build();
        let ctx = SemanticContext::with_types(["json-filter", "merge"]);

        let report = validate_semantics(&graph, Some(&ctx));
        assert!(report.valid);
        assert_eq!(report.warning_codes(), vec![ErrorCode::UnknownNodeType]);
        let warning = &report.warnings[0];
        assert!(warning.message.contains("Did you mean 'json-filter'?"));
        assert_eq!(warning.data.as_ref().unwrap()["suggestion"], "json-filter");
    }

    #[test]
    fn test_unknown_type_strict_is_error() {
        let graph = base().add_node("n1", "llm", (0.0, 0.0)).build();
        let ctx = SemanticContext::with_types(["merge"]).strict(true);

        let report = validate_semantics(&graph, Some(&ctx));
        assert!(!report.valid);
        assert_eq!(report.error_codes(), vec![ErrorCode::UnknownNodeType]);
        assert!(!report.has_critical_errors());
    }

    #[test]
    fn test_strict_with_empty_types_fails_every_node() {
        let graph = base()
            .add_node("n1", "code", (0.0, 0.0))
            .add_node("n2", "composite", (0.0, 0.0))
            .build();
        let ctx = SemanticContext::with_types(Vec::<String>::new()).strict(true);

        let report = validate_semantics(&graph, Some(&ctx));
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_no_type_check_without_available_types() {
        let graph = base().add_node("n1", "anything", (0.0, 0.0)).build();
        let ctx = SemanticContext::new().strict(true);
        assert!(validate_semantics(&graph, Some(&ctx)).valid);
    }

    #[test]
    fn test_timestamps() {
        let graph = CompositeBuilder::new("t", "T")
            .metadata(stamped("not a date", "2024-01-01T00:00:00Z"))
            .build();
        let report = validate_semantics(&graph, None);
        assert_eq!(report.error_codes(), vec![ErrorCode::InvalidTimestamp]);
        assert_eq!(report.errors[0].path, "metadata.created");

        let graph = CompositeBuilder::new("t", "T")
            .metadata(stamped("2024-02-01T00:00:00Z", "2024-01-01T00:00:00Z"))
            .build();
        let report = validate_semantics(&graph, None);
        assert!(report.valid);
        assert_eq!(report.warning_codes(), vec![ErrorCode::TimestampOrder]);
    }

    #[test]
    fn test_iso_dates_without_offset() {
        let graph = CompositeBuilder::new("t", "T")
            .metadata(stamped("2024-01-01", "2024-01-01T00:00:00"))
            .build();
        let report = validate_semantics(&graph, None);
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_all_rules_accumulate() {
        let mut graph = CompositeBuilder::new("t", "T")
            .metadata(stamped("bad", "bad"))
            .add_node("a", "code", (0.0, 0.0))
            .add_node("a", "code", (0.0, 0.0))
            .connect("e", "a", "x")
            .connect("e", "y", "a")
            .build();
        graph.nodes.push(NodeSpec::new("b", "code"));

        let report = validate_semantics(&graph, None);
        assert_eq!(
            report.error_codes(),
            vec![
                ErrorCode::DuplicateNodeId,
                ErrorCode::DuplicateEdgeId,
                ErrorCode::InvalidTargetNode,
                ErrorCode::InvalidSourceNode,
                ErrorCode::InvalidTimestamp,
                ErrorCode::InvalidTimestamp,
            ]
        );
    }
}
