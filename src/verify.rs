//! The replay verifier (§4.5): proves a completed document could have
//! been produced from a base document by a legitimate user journey —
//! filling visible editable fields and re-triggering evaluation to a
//! fixed point, then comparing the converged result against what was
//! claimed.

use crate::document::{Document, Status};
use crate::orchestrator::evaluate;
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Bounds the fixed-point loop; defaults to the 100 iterations named
/// in §4.5.
#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions {
    pub max_iterations: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self { max_iterations: 100 }
    }
}

/// One discrepancy found either during the fixed-point loop or the
/// final-state comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub code: IssueCode,
    pub field_id: Option<String>,
    pub expected: Option<Value>,
    pub claimed: Option<Value>,
    pub message: String,
}

impl Issue {
    fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            field_id: None,
            expected: None,
            claimed: None,
            message: message.into(),
        }
    }

    fn with_field(mut self, field_id: impl Into<String>) -> Self {
        self.field_id = Some(field_id.into());
        self
    }

    fn with_values(mut self, expected: Option<Value>, claimed: Option<Value>) -> Self {
        self.expected = expected;
        self.claimed = claimed;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    UnknownField,
    ComputedMismatch,
    AttestationUnsigned,
    AttestationNoEvidence,
    AttestationNoTimestamp,
    StatusMismatch,
    ConvergenceFailed,
    InternalError,
}

/// The result of a `verify` call.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub valid: bool,
    pub status: Option<Status>,
    pub issues: Vec<Issue>,
    pub converged_doc: Option<Document>,
    pub internal_error: Option<String>,
}

impl VerifyOutcome {
    fn failed(issues: Vec<Issue>) -> Self {
        Self {
            valid: false,
            status: None,
            issues,
            converged_doc: None,
            internal_error: None,
        }
    }
}

/// Runs the fixed-point replay algorithm from §4.5.
#[tracing::instrument(skip(completed, base))]
pub fn verify(completed: &Document, base: &Document, options: VerifyOptions) -> VerifyOutcome {
    let effective_instant = completed
        .valid_from
        .as_deref()
        .and_then(|s| crate::value::as_date(&Value::String(s.to_string())))
        .unwrap_or_else(Utc::now);

    match run_fixed_point(completed, base, effective_instant, options) {
        Ok(converged) => finalize(completed, converged),
        Err(issue) => VerifyOutcome::failed(vec![issue]),
    }
}

fn run_fixed_point(
    completed: &Document,
    base: &Document,
    effective_instant: DateTime<Utc>,
    options: VerifyOptions,
) -> Result<Document, Issue> {
    let mut current = base.clone();
    let mut prev_visible: Option<BTreeSet<String>> = None;

    for _ in 0..options.max_iterations.max(1) {
        let editable: Vec<String> = current
            .definitions
            .iter()
            .filter(|(_, def)| def.is_visible() && !def.readonly)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &editable {
            if let Some(value) = completed
                .definitions
                .get(name)
                .and_then(|def| def.value.clone())
            {
                if let Some(def) = current.definitions.get_mut(name) {
                    def.value = Some(value);
                }
            }
        }

        for (name, att) in current.attestations.iter_mut() {
            if let Some(completed_att) = completed.attestations.get(name) {
                att.signed = completed_att.signed;
                att.evidence = completed_att.evidence.clone();
            }
        }

        let result = evaluate(&current, effective_instant);

        if result
            .errors
            .iter()
            .any(|e| e.kind == crate::document::ValidationErrorKind::Internal)
        {
            tracing::warn!("evaluate reported an internal error during verify replay");
            return Err(Issue::new(
                IssueCode::InternalError,
                "evaluate reported an internal error during replay",
            ));
        }

        let visible_ids: BTreeSet<String> = result
            .definitions
            .iter()
            .filter(|(_, def)| def.is_visible())
            .map(|(name, _)| name.clone())
            .collect();

        if prev_visible.as_ref() == Some(&visible_ids) {
            return Ok(result);
        }

        prev_visible = Some(visible_ids);
        current = result;
    }

    Err(Issue::new(
        IssueCode::ConvergenceFailed,
        "visible-field set did not stabilize within the iteration budget",
    ))
}

/// Step 5: compares `completed` against the converged replay result,
/// collecting every discrepancy rather than stopping at the first.
fn finalize(completed: &Document, converged: Document) -> VerifyOutcome {
    let mut issues = Vec::new();

    for name in completed.definitions.keys() {
        if !converged.definitions.contains_key(name) {
            issues.push(Issue::new(IssueCode::UnknownField, format!("'{name}' is not a recognized field")).with_field(name));
        }
    }

    for (name, def) in converged.definitions.iter().filter(|(_, d)| d.readonly) {
        let expected = def.value.clone();
        let claimed = completed.definitions.get(name).and_then(|d| d.value.clone());
        if claimed != expected {
            issues.push(
                Issue::new(
                    IssueCode::ComputedMismatch,
                    format!("'{name}' does not match its computed value"),
                )
                .with_field(name)
                .with_values(expected, claimed),
            );
        }
    }

    for (name, att) in converged.attestations.iter().filter(|(_, a)| a.required) {
        if !att.signed {
            issues.push(
                Issue::new(IssueCode::AttestationUnsigned, format!("attestation '{name}' is not signed"))
                    .with_field(name),
            );
            continue;
        }
        let evidence = att.evidence.as_ref();
        let has_audit_id = evidence
            .and_then(|e| e.provider_audit_id.as_ref())
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        if !has_audit_id {
            issues.push(
                Issue::new(
                    IssueCode::AttestationNoEvidence,
                    format!("attestation '{name}' is signed but has no provider audit id"),
                )
                .with_field(name),
            );
        }
        let has_timestamp = evidence
            .and_then(|e| e.timestamp.as_ref())
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        if !has_timestamp {
            issues.push(
                Issue::new(
                    IssueCode::AttestationNoTimestamp,
                    format!("attestation '{name}' is signed but has no timestamp"),
                )
                .with_field(name),
            );
        }
    }

    if completed.status != converged.status {
        issues.push(
            Issue::new(IssueCode::StatusMismatch, "claimed status does not match the converged status").with_values(
                converged.status.map(|s| serde_json::to_value(s).unwrap_or(Value::Null)),
                completed.status.map(|s| serde_json::to_value(s).unwrap_or(Value::Null)),
            ),
        );
    }

    let valid = issues.is_empty();
    let status = converged.status;
    VerifyOutcome {
        valid,
        status,
        issues,
        converged_doc: Some(converged),
        internal_error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Action, DefType, Definition, Rule};
    use indexmap::IndexMap;
    use serde_json::json;

    fn def(def_type: DefType, value: Option<Value>, readonly: bool) -> Definition {
        Definition {
            def_type,
            value,
            options: None,
            label: None,
            ui_class: None,
            ui_message: None,
            required: false,
            readonly,
            visible: Some(true),
            min: None,
            max: None,
            step: None,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    fn sample_base() -> Document {
        let mut doc = Document::default();
        doc.definitions
            .insert("income".into(), def(DefType::Number, Some(json!(0)), false));
        doc.definitions
            .insert("tax_bracket".into(), def(DefType::String, None, true));
        doc.logic_tree = vec![Rule {
            id: "low".into(),
            law_ref: None,
            logic_version: None,
            when: Some(json!({"<": [{"var": "income"}, 50000]})),
            then: Some(Action {
                set: Some(IndexMap::from([("tax_bracket".to_string(), json!("low"))])),
                ui_modify: None,
                error_msg: None,
            }),
            disabled: false,
        }];
        doc
    }

    #[test]
    fn valid_replay_of_untampered_document() {
        let base = sample_base();
        let instant = Utc::now();
        let completed = evaluate(&base, instant);

        let outcome = verify(&completed, &base, VerifyOptions::default());
        assert!(outcome.valid, "issues: {:?}", outcome.issues);
    }

    #[test]
    fn tampered_readonly_field_is_detected() {
        let base = sample_base();
        let instant = Utc::now();
        let mut completed = evaluate(&base, instant);
        completed.definitions.get_mut("tax_bracket").unwrap().value = Some(json!("high"));

        let outcome = verify(&completed, &base, VerifyOptions::default());
        assert!(!outcome.valid);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.code == IssueCode::ComputedMismatch && i.field_id.as_deref() == Some("tax_bracket")));
    }

    #[test]
    fn injected_field_is_detected() {
        let base = sample_base();
        let instant = Utc::now();
        let mut completed = evaluate(&base, instant);
        completed
            .definitions
            .insert("injected".into(), def(DefType::String, Some(json!("x")), false));

        let outcome = verify(&completed, &base, VerifyOptions::default());
        assert!(!outcome.valid);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.code == IssueCode::UnknownField && i.field_id.as_deref() == Some("injected")));
    }
}
