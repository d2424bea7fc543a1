//! # rules-vm
//!
//! A declarative rules virtual machine over a self-describing JSON
//! document: an expression language, an evaluation pipeline, a replay
//! verifier, and a static analyzer.
//!
//! A document declares typed field [`Definition`]s, `when`/`then`
//! [`Rule`]s, derived (computed) fields, temporal branches, and
//! attestations. Three entry points operate on it:
//!
//! - [`evaluate`] runs the document through the evaluation pipeline
//!   once for a given effective instant, producing filled-in values,
//!   accumulated errors, and an overall status.
//! - [`verify`] replays a completed document against a base document
//!   to prove it could have been produced by a legitimate user
//!   journey.
//! - [`analyze`] statically lints a document for structural,
//!   referential, type, and cycle problems without executing it.
//!
//! ## Quick start
//!
//! ```rust
//! use chrono::Utc;
//! use rules_vm::{evaluate, Document};
//! use serde_json::json;
//!
//! let doc: Document = serde_json::from_value(json!({
//!     "definitions": {
//!         "income": { "type": "number", "value": 45000, "required": true },
//!         "tax_bracket": { "type": "string", "readonly": true }
//!     },
//!     "logic_tree": [{
//!         "id": "low",
//!         "when": { "<": [{ "var": "income" }, 50000] },
//!         "then": { "set": { "tax_bracket": "low" } }
//!     }]
//! })).unwrap();
//!
//! let result = evaluate(&doc, Utc::now());
//! assert_eq!(result.definitions["tax_bracket"].value, Some(json!("low")));
//! ```
//!
//! ## Modules
//!
//! - [`value`]: the runtime value type and its coercion rules
//! - [`document`]: the document model (definitions, rules, attestations, ...)
//! - [`expr`]: the expression resolver and operator table
//! - [`temporal`]: the temporal router
//! - [`validator`]: field/attestation validation and status determination
//! - [`orchestrator`]: the `evaluate` pipeline
//! - [`verify`]: the replay verifier
//! - [`analyze`]: the static analyzer
//! - [`error`]: the internal-failure error type

#![warn(missing_docs)]

pub mod analyze;
pub mod document;
pub mod error;
pub mod expr;
pub mod orchestrator;
pub mod temporal;
pub mod validator;
pub mod value;
pub mod verify;

pub use analyze::{analyze, AnalyzeOptions, AnalyzeOutcome};
pub use document::{
    Action, Attestation, DefType, Definition, DerivedField, Document, Evidence, Rule, StateModel,
    Status, TemporalBranch, ValidRange, ValidationError, ValidationErrorKind,
};
pub use error::EngineError;
pub use orchestrator::evaluate;
pub use value::Value;
pub use verify::{verify, Issue as VerifyIssue, IssueCode as VerifyIssueCode, VerifyOptions, VerifyOutcome};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn evaluate_then_verify_round_trips_a_minimal_document() {
        let doc: Document = serde_json::from_value(json!({
            "definitions": {
                "income": { "type": "number", "value": 45000, "required": true },
                "tax_bracket": { "type": "string", "readonly": true }
            },
            "logic_tree": [
                {
                    "id": "low",
                    "when": { "<": [{ "var": "income" }, 50000] },
                    "then": { "set": { "tax_bracket": "low" } }
                }
            ]
        }))
        .unwrap();

        let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let evaluated = evaluate(&doc, instant);
        assert_eq!(evaluated.status, Some(Status::Ready));
        assert_eq!(evaluated.definitions["tax_bracket"].value, Some(json!("low")));

        let outcome = verify(&evaluated, &doc, VerifyOptions::default());
        assert!(outcome.valid, "issues: {:?}", outcome.issues);
    }

    #[test]
    fn analyze_flags_an_empty_document() {
        let doc = Document::default();
        let outcome = analyze(&doc, AnalyzeOptions::default());
        assert!(!outcome.valid);
    }
}
