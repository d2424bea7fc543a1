//! The universal invariants from §8.1, each given at least one concrete
//! test.

use chrono::{TimeZone, Utc};
use rules_vm::{evaluate, verify, Document, Status, ValidationErrorKind, VerifyOptions};
use serde_json::json;

fn instant() -> chrono::DateTime<chrono::Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

fn base_document() -> Document {
    serde_json::from_value(json!({
        "definitions": {
            "income": { "type": "number", "value": 30000, "required": true },
            "tax_bracket": { "type": "string", "readonly": true }
        },
        "logic_tree": [{
            "id": "low",
            "when": { "<": [{ "var": "income" }, 50000] },
            "then": { "set": { "tax_bracket": "low" } }
        }]
    }))
    .unwrap()
}

#[test]
fn idempotence_of_evaluate() {
    let doc = base_document();
    let once = evaluate(&doc, instant());
    let twice = evaluate(&once, instant());

    assert_eq!(once.status, twice.status);
    assert_eq!(once.definitions["tax_bracket"].value, twice.definitions["tax_bracket"].value);
    assert_eq!(once.definitions["income"].value, twice.definitions["income"].value);

    let mut once_errors: Vec<_> = once.errors.iter().map(|e| (e.field_id.clone(), e.rule_id.clone(), e.kind, e.message.clone())).collect();
    let mut twice_errors: Vec<_> = twice.errors.iter().map(|e| (e.field_id.clone(), e.rule_id.clone(), e.kind, e.message.clone())).collect();
    once_errors.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
    twice_errors.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
    assert_eq!(once_errors, twice_errors);
}

#[test]
fn verify_after_evaluate_is_valid_when_ready() {
    let doc = base_document();
    let evaluated = evaluate(&doc, instant());
    assert_eq!(evaluated.status, Some(Status::Ready));

    let outcome = verify(&evaluated, &doc, VerifyOptions::default());
    assert!(outcome.valid, "issues: {:?}", outcome.issues);
}

#[test]
fn no_tamper_detection_on_a_readonly_field() {
    let doc = base_document();
    let evaluated = evaluate(&doc, instant());
    let computed = evaluated.definitions["tax_bracket"].value.clone();

    let mut tampered = evaluated.clone();
    tampered.definitions.get_mut("tax_bracket").unwrap().value = Some(json!("not_the_computed_value"));

    let outcome = verify(&tampered, &doc, VerifyOptions::default());
    assert!(!outcome.valid);
    assert!(outcome.issues.iter().any(|i| {
        i.code == rules_vm::VerifyIssueCode::ComputedMismatch && i.expected == computed
    }));
}

#[test]
fn injection_detection_for_an_undeclared_field() {
    let doc = base_document();
    let evaluated = evaluate(&doc, instant());

    let mut injected = evaluated.clone();
    injected.definitions.insert(
        "not_in_base".into(),
        rules_vm::Definition {
            def_type: rules_vm::DefType::String,
            value: Some(json!("x")),
            options: None,
            label: None,
            ui_class: None,
            ui_message: None,
            required: false,
            readonly: false,
            visible: Some(true),
            min: None,
            max: None,
            step: None,
            min_length: None,
            max_length: None,
            pattern: None,
        },
    );

    let outcome = verify(&injected, &doc, VerifyOptions::default());
    assert!(!outcome.valid);
    assert!(outcome
        .issues
        .iter()
        .any(|i| i.code == rules_vm::VerifyIssueCode::UnknownField && i.field_id.as_deref() == Some("not_in_base")));
}

#[test]
fn status_monotonicity_type_mismatch_always_invalid() {
    let doc: Document = serde_json::from_value(json!({
        "definitions": {
            "age": { "type": "number", "value": "not a number" }
        }
    }))
    .unwrap();
    let result = evaluate(&doc, instant());
    assert!(result.errors.iter().any(|e| e.kind == ValidationErrorKind::TypeMismatch));
    assert_eq!(result.status, Some(Status::Invalid));
}

#[test]
fn status_monotonicity_missing_required_without_type_mismatch_is_incomplete() {
    let doc: Document = serde_json::from_value(json!({
        "definitions": {
            "full_name": { "type": "string", "value": "", "required": true }
        }
    }))
    .unwrap();
    let result = evaluate(&doc, instant());
    assert!(!result.errors.iter().any(|e| e.kind == ValidationErrorKind::TypeMismatch));
    assert_eq!(result.status, Some(Status::Incomplete));
}

#[test]
fn temporal_inactivity_disabled_rules_leave_no_observable_effect() {
    let doc: Document = serde_json::from_value(json!({
        "definitions": {
            "fee": { "type": "number", "readonly": true }
        },
        "temporal_map": [
            { "valid_range": { "start": "2025-01-01" }, "logic_version": "v2" }
        ],
        "logic_tree": [{
            "id": "stale_rule",
            "logic_version": "v1",
            "when": true,
            "then": { "set": { "fee": 999 } }
        }]
    }))
    .unwrap();

    let result = evaluate(&doc, instant());
    assert_eq!(result.definitions["fee"].value, None);
}

#[test]
fn convergence_bound_reports_convergence_failed_under_a_tiny_budget() {
    // A rule that keeps a field's visibility flipping in lockstep with
    // an ever-growing counter never stabilizes the visible-name set
    // within a one-iteration budget.
    let base: Document = serde_json::from_value(json!({
        "definitions": {
            "toggle": { "type": "boolean", "value": false },
            "shadow": { "type": "number", "value": 0 }
        },
        "logic_tree": [{
            "id": "flip",
            "when": true,
            "then": { "set": { "toggle": true }, "ui_modify": { "shadow": { "visible": false } } }
        }]
    }))
    .unwrap();
    let completed = evaluate(&base, instant());

    let outcome = verify(
        &completed,
        &base,
        rules_vm::VerifyOptions { max_iterations: 1 },
    );
    // With a one-iteration cap the loop cannot even reach its own fixed
    // point comparison (there is no previous visible set to compare
    // against yet), so it must report convergence_failed rather than
    // silently accepting a result.
    assert!(outcome.issues.iter().any(|i| i.code == rules_vm::VerifyIssueCode::ConvergenceFailed));
}
