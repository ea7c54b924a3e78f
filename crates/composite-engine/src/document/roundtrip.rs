//! Round-trip equivalence checking
//!
//! Two graphs are semantically equal when they have the same identity,
//! metadata, node set and edge endpoints. Pass-through fields are ignored, a
//! missing position equals `{0, 0}` and a missing config equals `{}`.

use serde_json::{json, Value};

use super::{graph_from_value, to_document_value};
use crate::types::{CompositeGraph, Edge, NodeSpec};
use crate::validation::{ErrorCode, ValidationIssue};

/// Export and re-import `graph`, reporting every divergence as a warning
pub fn check_round_trip(graph: &CompositeGraph) -> Vec<ValidationIssue> {
    let reparsed = to_document_value(graph).and_then(graph_from_value);

    match reparsed {
        Ok(reparsed) => {
            let issues = diff_graphs(graph, &reparsed);
            if !issues.is_empty() {
                log::warn!(
                    "Round-trip of composite '{}' diverged in {} place(s)",
                    graph.id,
                    issues.len()
                );
            }
            issues
        }
        Err(e) => {
            log::warn!("Round-trip of composite '{}' failed: {}", graph.id, e);
            vec![mismatch("", format!("Document could not be re-imported: {}", e))]
        }
    }
}

/// Whether two graphs are equal modulo editor-only fields and defaults
pub fn semantically_equal(a: &CompositeGraph, b: &CompositeGraph) -> bool {
    diff_graphs(a, b).is_empty()
}

/// Every semantic difference between `expected` and `actual`
pub fn diff_graphs(expected: &CompositeGraph, actual: &CompositeGraph) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    compare(&mut issues, "id", &expected.id, &actual.id);
    compare(&mut issues, "name", &expected.name, &actual.name);
    compare(&mut issues, "category", &expected.category, &actual.category);
    compare(&mut issues, "type", &expected.kind, &actual.kind);
    compare(&mut issues, "version", &expected.version, &actual.version);
    compare(&mut issues, "description", &expected.description, &actual.description);
    compare(&mut issues, "metadata", &expected.metadata, &actual.metadata);
    compare(&mut issues, "variables", &expected.variables, &actual.variables);
    compare(&mut issues, "settings", &expected.settings, &actual.settings);

    if expected.nodes.len() != actual.nodes.len() {
        issues.push(
            mismatch("nodes", "Node count differs").with_data(json!({
                "expected": expected.nodes.len(),
                "actual": actual.nodes.len(),
            })),
        );
    } else {
        for (i, (a, b)) in expected.nodes.iter().zip(&actual.nodes).enumerate() {
            diff_nodes(&format!("nodes[{}]", i), a, b, &mut issues);
        }
    }

    if expected.edges.len() != actual.edges.len() {
        issues.push(
            mismatch("edges", "Edge count differs").with_data(json!({
                "expected": expected.edges.len(),
                "actual": actual.edges.len(),
            })),
        );
    } else {
        for (i, (a, b)) in expected.edges.iter().zip(&actual.edges).enumerate() {
            diff_edges(&format!("edges[{}]", i), a, b, &mut issues);
        }
    }

    issues
}

fn diff_nodes(path: &str, a: &NodeSpec, b: &NodeSpec, issues: &mut Vec<ValidationIssue>) {
    compare(issues, &format!("{}.id", path), &a.id, &b.id);
    compare(issues, &format!("{}.type", path), &a.node_type, &b.node_type);
    compare(
        issues,
        &format!("{}.position", path),
        &a.position.unwrap_or_default(),
        &b.position.unwrap_or_default(),
    );
    compare(
        issues,
        &format!("{}.config", path),
        &normalized_config(&a.config),
        &normalized_config(&b.config),
    );
    compare(issues, &format!("{}.data", path), &a.data, &b.data);
}

fn diff_edges(path: &str, a: &Edge, b: &Edge, issues: &mut Vec<ValidationIssue>) {
    compare(issues, &format!("{}.id", path), &a.id, &b.id);
    compare(issues, &format!("{}.source", path), &a.source, &b.source);
    compare(issues, &format!("{}.target", path), &a.target, &b.target);
    compare(issues, &format!("{}.data", path), &a.data, &b.data);
}

fn normalized_config(config: &Value) -> Value {
    if config.is_null() {
        json!({})
    } else {
        config.clone()
    }
}

fn compare<T>(issues: &mut Vec<ValidationIssue>, path: &str, expected: &T, actual: &T)
where
    T: PartialEq + serde::Serialize,
{
    if expected != actual {
        issues.push(mismatch(path, format!("Value changed across round-trip at '{}'", path)).with_data(
            json!({
                "expected": serde_json::to_value(expected).unwrap_or(Value::Null),
                "actual": serde_json::to_value(actual).unwrap_or(Value::Null),
            }),
        ));
    }
}

fn mismatch(path: impl Into<String>, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue::new(ErrorCode::RoundtripMismatch, path, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CompositeBuilder;
    use crate::types::{Endpoint, Position};

    fn sample() -> CompositeGraph {
        CompositeBuilder::new("t1", "T")
            .category("test")
            .add_node("n1", "code", (0.0, 0.0))
            .with_config(json!({"source": "return 1"}))
            .add_node("n2", "transform", (1.0, 0.0))
            .add_edge("n1", "result", "n2", "value")
            .build()
    }

    #[test]
    fn test_round_trip_clean() {
        let mut graph = sample();
        graph.nodes.push(NodeSpec::new("bare", "code"));
        graph.nodes[0].extras.insert("width".into(), json!(100));
        assert!(check_round_trip(&graph).is_empty());
    }

    #[test]
    fn test_defaults_are_equal() {
        let a = sample();
        let mut b = sample();
        b.nodes[0].position = None;
        b.nodes[1].config = json!({});
        b.nodes[1].extras.insert("hidden".into(), json!(true));
        assert!(semantically_equal(&a, &b));
    }

    #[test]
    fn test_detects_divergence() {
        let a = sample();
        let mut b = sample();
        b.edges[0].target = Endpoint::new("n2", "other");
        b.name = "Renamed".into();

        let issues = diff_graphs(&a, &b);
        let paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "edges[0].target"]);
        assert!(issues.iter().all(|i| i.code == ErrorCode::RoundtripMismatch));
    }

    #[test]
    fn test_unrepresentable_position_is_reported() {
        let mut graph = sample();
        graph.nodes[0].position = Some(Position::new(f64::NAN, 0.0));
        let issues = check_round_trip(&graph);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ErrorCode::RoundtripMismatch);
    }
}
