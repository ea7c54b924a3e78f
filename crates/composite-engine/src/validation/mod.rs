//! Two-stage validation pipeline
//!
//! 1. Structural: the untyped document has the right shape.
//! 2. Semantic: the typed graph satisfies graph invariants.
//!
//! Structural failure always short-circuits the semantic stage so callers
//! never see cascading errors from a malformed document.

mod report;
mod semantic;
mod structural;
mod suggest;

pub use report::{ErrorCode, StructuralReport, ValidationIssue, ValidationReport};
pub use semantic::{validate_semantics, SemanticContext};
pub use structural::{validate_structure, DOCUMENT_KEYS, EDITOR_STATE_KEYS};
pub use suggest::{suggest_type, to_kebab_case};

use serde_json::Value;

use crate::document::{from_document_value, DocumentOptions};
use crate::error::EngineError;

/// Run the full pipeline on an untyped document
///
/// Editor-injected fields are tolerated the same way document import
/// tolerates them.
pub fn validate_document(raw: &Value, context: Option<&SemanticContext>) -> ValidationReport {
    let options = DocumentOptions {
        validate_semantics: true,
        context: context.cloned(),
        check_round_trip: false,
    };

    match from_document_value(raw.clone(), &options) {
        Ok(parsed) => ValidationReport::from_parts(Vec::new(), parsed.warnings),
        Err(EngineError::Validation(report)) => *report,
        Err(e) => ValidationReport::from_parts(
            vec![ValidationIssue::new(ErrorCode::InvalidInputType, "", e.to_string())],
            Vec::new(),
        ),
    }
}
