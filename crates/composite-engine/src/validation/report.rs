//! Structured validation results
//!
//! Validation never fails with `Err` for invalid input; it returns a report
//! carrying every issue discovered in one pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Machine-readable issue code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Document root is not an object
    InvalidInputType,
    /// A required field is absent, empty, or not a string
    MissingRequiredFields,
    /// A field is present with the wrong JSON type
    InvalidFieldType,
    /// A top-level key outside the recognized schema
    UnknownField,
    /// A node entry does not match the node shape
    InvalidNode,
    /// An edge entry does not match the flat edge shape
    InvalidEdge,
    /// A non-object array entry was coerced to an empty object
    CoercedEntry,
    DuplicateNodeId,
    DuplicateEdgeId,
    InvalidSourceNode,
    InvalidTargetNode,
    UnknownNodeType,
    InvalidTimestamp,
    /// `created` is later than `modified`
    TimestampOrder,
    /// Document round-trip produced a different graph
    RoundtripMismatch,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInputType => "INVALID_INPUT_TYPE",
            Self::MissingRequiredFields => "MISSING_REQUIRED_FIELDS",
            Self::InvalidFieldType => "INVALID_FIELD_TYPE",
            Self::UnknownField => "UNKNOWN_FIELD",
            Self::InvalidNode => "INVALID_NODE",
            Self::InvalidEdge => "INVALID_EDGE",
            Self::CoercedEntry => "COERCED_ENTRY",
            Self::DuplicateNodeId => "DUPLICATE_NODE_ID",
            Self::DuplicateEdgeId => "DUPLICATE_EDGE_ID",
            Self::InvalidSourceNode => "INVALID_SOURCE_NODE",
            Self::InvalidTargetNode => "INVALID_TARGET_NODE",
            Self::UnknownNodeType => "UNKNOWN_NODE_TYPE",
            Self::InvalidTimestamp => "INVALID_TIMESTAMP",
            Self::TimestampOrder => "TIMESTAMP_ORDER",
            Self::RoundtripMismatch => "ROUNDTRIP_MISMATCH",
        }
    }

    /// Errors that must halt a caller immediately
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::DuplicateNodeId
                | Self::DuplicateEdgeId
                | Self::InvalidSourceNode
                | Self::InvalidTargetNode
                | Self::InvalidTimestamp
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation finding with location context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path into the document, e.g. `nodes[2].id`
    pub path: String,
    pub message: String,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ValidationIssue {
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.code, self.path, self.message)
        }
    }
}

/// Outcome of structural (schema-shape) validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralReport {
    pub valid: bool,
    /// Offending fields, one issue per violation
    pub fields: Vec<ValidationIssue>,
}

impl StructuralReport {
    pub fn from_issues(fields: Vec<ValidationIssue>) -> Self {
        Self {
            valid: fields.is_empty(),
            fields,
        }
    }
}

/// Outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// A passing report with no findings
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn from_parts(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Fold another report's findings into this one
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.valid = self.errors.is_empty();
    }

    pub fn has_critical_errors(&self) -> bool {
        self.errors.iter().any(|e| e.code.is_critical())
    }

    pub fn critical_errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().filter(|e| e.code.is_critical())
    }

    pub fn error_codes(&self) -> Vec<ErrorCode> {
        self.errors.iter().map(|e| e.code).collect()
    }

    pub fn warning_codes(&self) -> Vec<ErrorCode> {
        self.warnings.iter().map(|w| w.code).collect()
    }
}

impl From<StructuralReport> for ValidationReport {
    fn from(report: StructuralReport) -> Self {
        Self::from_parts(report.fields, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_classification() {
        assert!(ErrorCode::DuplicateNodeId.is_critical());
        assert!(ErrorCode::DuplicateEdgeId.is_critical());
        assert!(ErrorCode::InvalidSourceNode.is_critical());
        assert!(ErrorCode::InvalidTargetNode.is_critical());
        assert!(ErrorCode::InvalidTimestamp.is_critical());
        assert!(!ErrorCode::UnknownNodeType.is_critical());
        assert!(!ErrorCode::MissingRequiredFields.is_critical());
        assert!(!ErrorCode::InvalidNode.is_critical());
    }

    #[test]
    fn test_code_serialization() {
        let json = serde_json::to_value(ErrorCode::InvalidSourceNode).unwrap();
        assert_eq!(json, "INVALID_SOURCE_NODE");
        assert_eq!(ErrorCode::RoundtripMismatch.to_string(), "ROUNDTRIP_MISMATCH");
    }

    #[test]
    fn test_merge_recomputes_validity() {
        let mut report = ValidationReport::ok();
        report.merge(ValidationReport::from_parts(
            vec![ValidationIssue::new(ErrorCode::DuplicateEdgeId, "edges[1].id", "dup")],
            vec![],
        ));
        assert!(!report.valid);
        assert!(report.has_critical_errors());
        assert_eq!(report.critical_errors().count(), 1);
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::new(ErrorCode::InvalidNode, "nodes[0].type", "must be a string");
        assert_eq!(issue.to_string(), "[INVALID_NODE] nodes[0].type: must be a string");
    }
}
