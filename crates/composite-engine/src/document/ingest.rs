//! Tolerant ingestion of editor-produced documents
//!
//! Editors inject transient state (selection flags, `zIndex`,
//! `positionAbsolute`, `measured`, viewport) at every level. Those fields are
//! stripped here before validation. Opaque payloads (`config`, `data`, and
//! pass-through values) are never descended into.

use serde_json::{Map, Value};

use super::schema::{EDGE_FIELDS, EDGE_PASSTHROUGH, NODE_FIELDS, NODE_PASSTHROUGH};
use crate::validation::{ErrorCode, ValidationIssue, EDITOR_STATE_KEYS};

const METADATA_FIELDS: &[&str] = &["created", "modified", "author", "tags", "icon"];
const VARIABLE_FIELDS: &[&str] = &["type", "default", "description"];
const SETTINGS_FIELDS: &[&str] = &["timeout", "retries", "parallel"];
const POSITION_FIELDS: &[&str] = &["x", "y"];

/// Result of sanitizing a raw document
#[derive(Debug, Clone)]
pub struct Ingested {
    pub document: Value,
    /// Coercion warnings
    pub warnings: Vec<ValidationIssue>,
    /// Number of editor-injected fields removed
    pub dropped: usize,
}

/// Strip editor-injected fields and coerce non-object array entries
///
/// Unknown top-level keys are left in place for the structural validator to
/// report. A non-object root is returned unchanged.
pub fn sanitize(raw: Value) -> Ingested {
    let mut warnings = Vec::new();
    let mut dropped = 0;

    let mut root = match raw {
        Value::Object(root) => root,
        other => {
            return Ingested {
                document: other,
                warnings,
                dropped,
            }
        }
    };

    for key in EDITOR_STATE_KEYS {
        if root.remove(*key).is_some() {
            dropped += 1;
        }
    }

    if let Some(Value::Object(metadata)) = root.get_mut("metadata") {
        dropped += retain_keys(metadata, &[METADATA_FIELDS]);
    }

    if let Some(Value::Array(nodes)) = root.get_mut("nodes") {
        for (i, entry) in nodes.iter_mut().enumerate() {
            coerce_entry(entry, &format!("nodes[{}]", i), &mut warnings);
            if let Value::Object(node) = entry {
                dropped += retain_keys(node, &[NODE_FIELDS, NODE_PASSTHROUGH]);
                if let Some(Value::Object(position)) = node.get_mut("position") {
                    dropped += retain_keys(position, &[POSITION_FIELDS]);
                }
            }
        }
    }

    if let Some(Value::Array(edges)) = root.get_mut("edges") {
        for (i, entry) in edges.iter_mut().enumerate() {
            coerce_entry(entry, &format!("edges[{}]", i), &mut warnings);
            if let Value::Object(edge) = entry {
                dropped += retain_keys(edge, &[EDGE_FIELDS, EDGE_PASSTHROUGH]);
            }
        }
    }

    if let Some(Value::Object(variables)) = root.get_mut("variables") {
        for variable in variables.values_mut() {
            if let Value::Object(variable) = variable {
                dropped += retain_keys(variable, &[VARIABLE_FIELDS]);
            }
        }
    }

    if let Some(Value::Object(settings)) = root.get_mut("settings") {
        dropped += retain_keys(settings, &[SETTINGS_FIELDS]);
    }

    if dropped > 0 {
        log::debug!("Dropped {} editor-injected field(s) during ingestion", dropped);
    }

    Ingested {
        document: Value::Object(root),
        warnings,
        dropped,
    }
}

/// Replace a non-object entry with `{}` and record a warning
fn coerce_entry(entry: &mut Value, path: &str, warnings: &mut Vec<ValidationIssue>) {
    if !entry.is_object() {
        log::warn!("Coercing non-object entry at {} to an empty object", path);
        warnings.push(
            ValidationIssue::new(
                ErrorCode::CoercedEntry,
                path,
                "Non-object entry was coerced to an empty object",
            )
            .with_data(serde_json::json!({ "original": entry.clone() })),
        );
        *entry = Value::Object(Map::new());
    }
}

/// Keep only keys listed in one of `allowed`, returning how many were removed
fn retain_keys(map: &mut Map<String, Value>, allowed: &[&[&str]]) -> usize {
    let before = map.len();
    map.retain(|key, _| allowed.iter().any(|set| set.contains(&key.as_str())));
    before - map.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strips_editor_state() {
        let raw = json!({
            "id": "t1",
            "viewport": {"x": 0, "y": 0, "zoom": 1},
            "metadata": {"created": "c", "modified": "m", "lastOpened": "x"},
            "nodes": [{
                "id": "n1",
                "type": "code",
                "position": {"x": 0, "y": 0, "z": 3},
                "positionAbsolute": {"x": 10, "y": 10},
                "selected": true,
                "zIndex": 4,
                "measured": {"width": 10},
                "width": 120,
                "config": {"selected": true, "nested": {"zIndex": 1}}
            }],
            "edges": [{"id": "e1", "source": "n1", "target": "n1", "selected": false, "animated": true}],
            "settings": {"timeout": 10, "debug": true}
        });

        let ingested = sanitize(raw);
        let doc = ingested.document;
        assert!(doc.get("viewport").is_none());
        assert!(doc["metadata"].get("lastOpened").is_none());

        let node = &doc["nodes"][0];
        assert_eq!(node["position"], json!({"x": 0, "y": 0}));
        assert!(node.get("positionAbsolute").is_none());
        assert!(node.get("selected").is_none());
        assert!(node.get("zIndex").is_none());
        assert!(node.get("measured").is_none());
        assert_eq!(node["width"], 120);
        // opaque payloads are untouched
        assert_eq!(node["config"], json!({"selected": true, "nested": {"zIndex": 1}}));

        let edge = &doc["edges"][0];
        assert!(edge.get("selected").is_none());
        assert_eq!(edge["animated"], true);
        assert!(doc["settings"].get("debug").is_none());

        assert!(ingested.warnings.is_empty());
        assert_eq!(ingested.dropped, 9);
    }

    #[test]
    fn test_unknown_top_level_kept_for_validation() {
        let ingested = sanitize(json!({"id": "t1", "extra": 1}));
        assert_eq!(ingested.document["extra"], 1);
    }

    #[test]
    fn test_coerces_non_object_entries() {
        let ingested = sanitize(json!({"nodes": [1, {"id": "n"}], "edges": ["e"]}));
        assert_eq!(ingested.document["nodes"][0], json!({}));
        assert_eq!(ingested.document["edges"][0], json!({}));
        assert_eq!(ingested.warnings.len(), 2);
        assert_eq!(ingested.warnings[0].code, ErrorCode::CoercedEntry);
        assert_eq!(ingested.warnings[0].path, "nodes[0]");
        assert_eq!(ingested.warnings[1].path, "edges[0]");
        assert_eq!(ingested.warnings[0].data.as_ref().unwrap()["original"], 1);
    }

    #[test]
    fn test_non_object_root_unchanged() {
        let ingested = sanitize(json!([1, 2]));
        assert_eq!(ingested.document, json!([1, 2]));
    }
}
