//! Schema-shape validation of the untyped document form
//!
//! Runs before anything is deserialized into the graph model. Every
//! violation is collected; only a non-object root stops the walk early.

use serde_json::{Map, Value};

use super::report::{ErrorCode, StructuralReport, ValidationIssue};

/// Top-level keys of the document schema
pub const DOCUMENT_KEYS: &[&str] = &[
    "id",
    "name",
    "category",
    "type",
    "version",
    "description",
    "metadata",
    "nodes",
    "edges",
    "variables",
    "settings",
];

/// Editor state that may appear at the top level and is ignored
pub const EDITOR_STATE_KEYS: &[&str] = &[
    "viewport",
    "selection",
    "selectedNodes",
    "selectedEdges",
    "zoom",
    "transform",
];

/// Validate the shape of a raw document
pub fn validate_structure(raw: &Value) -> StructuralReport {
    let Some(root) = raw.as_object() else {
        return StructuralReport::from_issues(vec![ValidationIssue::new(
            ErrorCode::InvalidInputType,
            "",
            format!("Document must be an object, got {}", json_type(raw)),
        )]);
    };

    let mut issues = Vec::new();

    validate_identity(root, &mut issues);
    validate_required_keys(root, &mut issues);
    validate_metadata(root, &mut issues);
    validate_nodes(root, &mut issues);
    validate_edges(root, &mut issues);
    validate_variables(root, &mut issues);
    validate_settings(root, &mut issues);
    validate_known_keys(root, &mut issues);

    StructuralReport::from_issues(issues)
}

/// `id` and `name` must be non-empty strings
fn validate_identity(root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    for field in ["id", "name"] {
        match root.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) => issues.push(ValidationIssue::new(
                ErrorCode::MissingRequiredFields,
                field,
                format!("Required field '{}' must not be empty", field),
            )),
            Some(other) => issues.push(ValidationIssue::new(
                ErrorCode::MissingRequiredFields,
                field,
                format!("Required field '{}' must be a string, got {}", field, json_type(other)),
            )),
            None => issues.push(ValidationIssue::new(
                ErrorCode::MissingRequiredFields,
                field,
                format!("Missing required field '{}'", field),
            )),
        }
    }
}

/// Remaining required keys and optional scalar keys
fn validate_required_keys(root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let required: [(&str, JsonKind); 6] = [
        ("category", JsonKind::String),
        ("type", JsonKind::String),
        ("version", JsonKind::String),
        ("metadata", JsonKind::Object),
        ("nodes", JsonKind::Array),
        ("edges", JsonKind::Array),
    ];

    for (field, kind) in required {
        match root.get(field) {
            None => issues.push(ValidationIssue::new(
                ErrorCode::MissingRequiredFields,
                field,
                format!("Missing required field '{}'", field),
            )),
            Some(value) => check_kind(value, kind, field, issues),
        }
    }

    if let Some(description) = root.get("description") {
        if !description.is_null() {
            check_kind(description, JsonKind::String, "description", issues);
        }
    }
}

fn validate_metadata(root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let Some(Value::Object(metadata)) = root.get("metadata") else {
        return;
    };

    for field in ["created", "modified"] {
        let path = format!("metadata.{}", field);
        match metadata.get(field) {
            None => issues.push(ValidationIssue::new(
                ErrorCode::MissingRequiredFields,
                &path,
                format!("Missing required metadata field '{}'", field),
            )),
            Some(value) => check_kind(value, JsonKind::String, &path, issues),
        }
    }

    for field in ["author", "icon"] {
        if let Some(value) = metadata.get(field).filter(|v| !v.is_null()) {
            check_kind(value, JsonKind::String, &format!("metadata.{}", field), issues);
        }
    }

    match metadata.get("tags") {
        None | Some(Value::Null) => {}
        Some(Value::Array(tags)) => {
            for (i, tag) in tags.iter().enumerate() {
                if !tag.is_string() {
                    issues.push(ValidationIssue::new(
                        ErrorCode::InvalidFieldType,
                        format!("metadata.tags[{}]", i),
                        format!("Tag must be a string, got {}", json_type(tag)),
                    ));
                }
            }
        }
        Some(other) => issues.push(ValidationIssue::new(
            ErrorCode::InvalidFieldType,
            "metadata.tags",
            format!("Tags must be an array of strings, got {}", json_type(other)),
        )),
    }
}

fn validate_nodes(root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let Some(Value::Array(nodes)) = root.get("nodes") else {
        return;
    };

    for (i, node) in nodes.iter().enumerate() {
        let path = format!("nodes[{}]", i);
        let Some(node) = node.as_object() else {
            issues.push(ValidationIssue::new(
                ErrorCode::InvalidNode,
                &path,
                format!("Node must be an object, got {}", json_type(node)),
            ));
            continue;
        };

        for field in ["id", "type"] {
            if !is_non_empty_string(node.get(field)) {
                issues.push(ValidationIssue::new(
                    ErrorCode::InvalidNode,
                    format!("{}.{}", path, field),
                    format!("Node '{}' must be a non-empty string", field),
                ));
            }
        }

        match node.get("position") {
            Some(Value::Object(position)) => {
                for axis in ["x", "y"] {
                    if !position.get(axis).is_some_and(Value::is_number) {
                        issues.push(ValidationIssue::new(
                            ErrorCode::InvalidNode,
                            format!("{}.position.{}", path, axis),
                            format!("Position '{}' must be a number", axis),
                        ));
                    }
                }
            }
            Some(other) => issues.push(ValidationIssue::new(
                ErrorCode::InvalidNode,
                format!("{}.position", path),
                format!("Position must be an object, got {}", json_type(other)),
            )),
            None => issues.push(ValidationIssue::new(
                ErrorCode::InvalidNode,
                format!("{}.position", path),
                "Node is missing a position",
            )),
        }
    }
}

fn validate_edges(root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let Some(Value::Array(edges)) = root.get("edges") else {
        return;
    };

    for (i, edge) in edges.iter().enumerate() {
        let path = format!("edges[{}]", i);
        let Some(edge) = edge.as_object() else {
            issues.push(ValidationIssue::new(
                ErrorCode::InvalidEdge,
                &path,
                format!("Edge must be an object, got {}", json_type(edge)),
            ));
            continue;
        };

        if !is_non_empty_string(edge.get("id")) {
            issues.push(ValidationIssue::new(
                ErrorCode::InvalidEdge,
                format!("{}.id", path),
                "Edge 'id' must be a non-empty string",
            ));
        }

        for field in ["source", "target"] {
            let message = match edge.get(field) {
                Some(Value::String(s)) if !s.is_empty() => continue,
                Some(Value::Object(_)) => format!(
                    "Edge '{}' must be a node id string; structured endpoints are not allowed",
                    field
                ),
                Some(other) => format!(
                    "Edge '{}' must be a node id string, got {}",
                    field,
                    json_type(other)
                ),
                None => format!("Edge is missing '{}'", field),
            };
            issues.push(ValidationIssue::new(
                ErrorCode::InvalidEdge,
                format!("{}.{}", path, field),
                message,
            ));
        }

        for field in ["sourceHandle", "targetHandle"] {
            match edge.get(field) {
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(other) => issues.push(ValidationIssue::new(
                    ErrorCode::InvalidEdge,
                    format!("{}.{}", path, field),
                    format!("Edge '{}' must be a string, got {}", field, json_type(other)),
                )),
            }
        }
    }
}

fn validate_variables(root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let variables = match root.get("variables") {
        None | Some(Value::Null) => return,
        Some(Value::Object(variables)) => variables,
        Some(other) => {
            issues.push(ValidationIssue::new(
                ErrorCode::InvalidFieldType,
                "variables",
                format!("Variables must be an object, got {}", json_type(other)),
            ));
            return;
        }
    };

    for (name, variable) in variables {
        let path = format!("variables.{}", name);
        match variable.as_object() {
            Some(variable) => {
                if !variable.get("type").is_some_and(Value::is_string) {
                    issues.push(ValidationIssue::new(
                        ErrorCode::InvalidFieldType,
                        format!("{}.type", path),
                        "Variable 'type' must be a string",
                    ));
                }
                if let Some(description) = variable.get("description").filter(|v| !v.is_null()) {
                    check_kind(description, JsonKind::String, &format!("{}.description", path), issues);
                }
            }
            None => issues.push(ValidationIssue::new(
                ErrorCode::InvalidFieldType,
                path,
                format!("Variable must be an object, got {}", json_type(variable)),
            )),
        }
    }
}

fn validate_settings(root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let settings = match root.get("settings") {
        None | Some(Value::Null) => return,
        Some(Value::Object(settings)) => settings,
        Some(other) => {
            issues.push(ValidationIssue::new(
                ErrorCode::InvalidFieldType,
                "settings",
                format!("Settings must be an object, got {}", json_type(other)),
            ));
            return;
        }
    };

    // `timeout` is optional; `retries` and `parallel` have no null form
    for (field, nullable) in [("timeout", true), ("retries", false)] {
        if let Some(value) = settings.get(field).filter(|v| !(nullable && v.is_null())) {
            if value.as_u64().is_none() {
                issues.push(ValidationIssue::new(
                    ErrorCode::InvalidFieldType,
                    format!("settings.{}", field),
                    format!("Setting '{}' must be a non-negative integer", field),
                ));
            }
        }
    }

    if let Some(parallel) = settings.get("parallel") {
        check_kind(parallel, JsonKind::Bool, "settings.parallel", issues);
    }
}

/// Reject top-level keys outside the schema, ignoring editor state
fn validate_known_keys(root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    for key in root.keys() {
        let key = key.as_str();
        if DOCUMENT_KEYS.contains(&key) || EDITOR_STATE_KEYS.contains(&key) {
            continue;
        }
        issues.push(ValidationIssue::new(
            ErrorCode::UnknownField,
            key,
            format!("Unknown top-level field '{}'", key),
        ));
    }
}

#[derive(Debug, Clone, Copy)]
enum JsonKind {
    String,
    Object,
    Array,
    Bool,
}

impl JsonKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Bool => value.is_boolean(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Object => "object",
            Self::Array => "array",
            Self::Bool => "boolean",
        }
    }
}

fn check_kind(value: &Value, kind: JsonKind, path: &str, issues: &mut Vec<ValidationIssue>) {
    if !kind.matches(value) {
        issues.push(ValidationIssue::new(
            ErrorCode::InvalidFieldType,
            path,
            format!("Expected {}, got {}", kind.name(), json_type(value)),
        ));
    }
}

fn is_non_empty_string(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if !s.is_empty())
}

/// JSON type name used in messages
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_document() -> Value {
        json!({
            "id": "t1",
            "name": "T",
            "category": "test",
            "type": "composite",
            "version": "1.0.0",
            "metadata": {
                "created": "2024-01-01T00:00:00Z",
                "modified": "2024-01-01T00:00:00Z"
            },
            "nodes": [
                {"id": "n1", "type": "code", "position": {"x": 0, "y": 0}},
                {"id": "n2", "type": "transform", "position": {"x": 1, "y": 0}}
            ],
            "edges": [{"id": "e1", "source": "n1", "target": "n2"}]
        })
    }

    fn codes(report: &StructuralReport) -> Vec<ErrorCode> {
        report.fields.iter().map(|f| f.code).collect()
    }

    #[test]
    fn test_valid_document() {
        let report = validate_structure(&valid_document());
        assert!(report.valid, "{:?}", report.fields);
    }

    #[test]
    fn test_non_object_input() {
        for raw in [json!(null), json!([1, 2]), json!("doc"), json!(42)] {
            let report = validate_structure(&raw);
            assert!(!report.valid);
            assert_eq!(codes(&report), vec![ErrorCode::InvalidInputType]);
        }
    }

    #[test]
    fn test_missing_identity_reported_per_field() {
        let mut doc = valid_document();
        let root = doc.as_object_mut().unwrap();
        root.remove("id");
        root.insert("name".into(), json!(""));

        let report = validate_structure(&doc);
        assert_eq!(
            codes(&report),
            vec![ErrorCode::MissingRequiredFields, ErrorCode::MissingRequiredFields]
        );
        assert_eq!(report.fields[0].path, "id");
        assert_eq!(report.fields[1].path, "name");
    }

    #[test]
    fn test_non_string_id() {
        let mut doc = valid_document();
        doc["id"] = json!(7);
        let report = validate_structure(&doc);
        assert_eq!(codes(&report), vec![ErrorCode::MissingRequiredFields]);
    }

    #[test]
    fn test_node_shape() {
        let mut doc = valid_document();
        doc["nodes"] = json!([
            {"id": "n1", "type": "code"},
            {"id": "", "type": "code", "position": {"x": "0", "y": 0}},
            {}
        ]);

        let report = validate_structure(&doc);
        let paths: Vec<&str> = report.fields.iter().map(|f| f.path.as_str()).collect();
        assert!(report.fields.iter().all(|f| f.code == ErrorCode::InvalidNode));
        assert_eq!(
            paths,
            vec![
                "nodes[0].position",
                "nodes[1].id",
                "nodes[1].position.x",
                "nodes[2].id",
                "nodes[2].type",
                "nodes[2].position",
            ]
        );
    }

    #[test]
    fn test_structured_edge_endpoints_rejected() {
        let mut doc = valid_document();
        doc["edges"] = json!([{
            "id": "e1",
            "source": {"nodeId": "n1", "portId": "output"},
            "target": {"nodeId": "n2", "portId": "input"}
        }]);

        let report = validate_structure(&doc);
        assert_eq!(codes(&report), vec![ErrorCode::InvalidEdge, ErrorCode::InvalidEdge]);
        assert!(report.fields[0].message.contains("structured endpoints"));
    }

    #[test]
    fn test_edge_handles_must_be_strings() {
        let mut doc = valid_document();
        doc["edges"][0]["sourceHandle"] = json!(3);
        doc["edges"][0]["targetHandle"] = Value::Null;

        let report = validate_structure(&doc);
        assert_eq!(report.fields.len(), 1);
        assert_eq!(report.fields[0].path, "edges[0].sourceHandle");
    }

    #[test]
    fn test_unknown_top_level_key() {
        let mut doc = valid_document();
        doc["extra"] = json!(true);
        doc["viewport"] = json!({"x": 0, "y": 0, "zoom": 1});

        let report = validate_structure(&doc);
        assert_eq!(codes(&report), vec![ErrorCode::UnknownField]);
        assert_eq!(report.fields[0].path, "extra");
    }

    #[test]
    fn test_metadata_shape() {
        let mut doc = valid_document();
        doc["metadata"] = json!({"created": 1, "tags": ["ok", 2]});

        let report = validate_structure(&doc);
        assert_eq!(
            codes(&report),
            vec![
                ErrorCode::InvalidFieldType,
                ErrorCode::MissingRequiredFields,
                ErrorCode::InvalidFieldType,
            ]
        );
        assert_eq!(report.fields[2].path, "metadata.tags[1]");
    }

    #[test]
    fn test_settings_and_variables_shape() {
        let mut doc = valid_document();
        doc["settings"] = json!({"timeout": -5, "retries": 1, "parallel": "yes"});
        doc["variables"] = json!({"limit": {"type": "number", "default": 3}, "bad": 1});

        let report = validate_structure(&doc);
        let paths: Vec<&str> = report.fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["variables.bad", "settings.timeout", "settings.parallel"]);
    }

    #[test]
    fn test_null_settings_fields() {
        let mut doc = valid_document();
        doc["settings"] = json!({"timeout": null, "retries": null, "parallel": null});

        let report = validate_structure(&doc);
        let paths: Vec<&str> = report.fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["settings.retries", "settings.parallel"]);
        assert!(report.fields[1].message.contains("got null"));
    }

    #[test]
    fn test_collects_everything_in_one_pass() {
        let doc = json!({"nodes": "nope", "edges": [1]});
        let report = validate_structure(&doc);
        // id, name, category, type, version, metadata missing; nodes wrong type; edge[0] not an object
        assert_eq!(report.fields.len(), 8);
    }
}
