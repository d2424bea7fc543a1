//! The evaluation orchestrator (§4.4): the single totally-ordered
//! pipeline `materialize → route → derived → rules → derived →
//! validate → attestations → status → return`.

use crate::document::{
    Action, DefType, Definition, Document, Status, ValidationError, ValidationErrorKind,
};
use crate::error::EngineError;
use crate::expr::EvalContext;
use crate::temporal;
use crate::validator;
use crate::value::Value;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// Turns a caught `catch_unwind` payload into an [`EngineError`],
/// recovering a message from the payload when the panic carried a
/// `&str` or `String` (the two shapes `panic!`/`unwrap`/`expect`
/// produce) and falling back to a generic message otherwise.
fn engine_error_from_panic(payload: Box<dyn std::any::Any + Send>) -> EngineError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    EngineError::internal(message)
}

/// Runs the evaluation pipeline exactly once against a deep-cloned
/// working copy of `document`, returning a fresh result document with
/// `definitions`, `errors`, and `status` populated.
///
/// The pipeline is panic-safe: any internal failure produces a
/// single-error result document rather than unwinding into the caller,
/// per §7's "crash-safe by construction" contract.
#[tracing::instrument(skip(document), fields(schema_id = document.schema_id.as_deref()))]
pub fn evaluate(document: &Document, effective_instant: DateTime<Utc>) -> Document {
    let input = document.clone();
    match panic::catch_unwind(AssertUnwindSafe(|| run_pipeline(input, effective_instant))) {
        Ok(result) => result,
        Err(payload) => {
            let err = engine_error_from_panic(payload);
            tracing::warn!(error = %err, "evaluation pipeline panicked; returning internal_error result");
            let mut failed = document.clone();
            failed.errors = vec![ValidationError::new(
                ValidationErrorKind::Internal,
                err.to_string(),
            )];
            failed.status = Some(Status::Invalid);
            failed
        }
    }
}

fn run_pipeline(mut doc: Document, effective_instant: DateTime<Utc>) -> Document {
    let mut errors = Vec::new();

    // Step 1: materialize.
    for def in doc.definitions.values_mut() {
        if def.visible.is_none() {
            def.visible = Some(true);
        }
    }

    // Step 2: temporal routing.
    if !doc.temporal_map.is_empty() {
        errors.extend(temporal::route(
            &doc.temporal_map,
            &mut doc.logic_tree,
            effective_instant,
        ));
    }

    let derived = doc
        .state_model
        .as_ref()
        .map(|sm| sm.derived.clone())
        .unwrap_or_default();

    // Step 3: derived pass 1.
    run_derived_pass(&derived, &mut doc.definitions, &mut errors);

    // Step 4: rule pass.
    let mut writers: HashMap<String, String> = HashMap::new();
    for rule in doc.logic_tree.iter().filter(|r| !r.disabled) {
        let truthy = {
            let mut ctx = EvalContext::new(&doc.definitions, &derived);
            let Some(when) = rule.when.as_ref() else {
                continue;
            };
            let result = crate::value::truthy(&ctx.eval(when));
            errors.extend(ctx.findings);
            result
        };

        if !truthy {
            continue;
        }

        tracing::debug!(rule_id = %rule.id, "rule fired");

        let Some(action) = rule.then.as_ref() else {
            continue;
        };
        apply_action(
            action,
            &mut doc.definitions,
            &derived,
            &rule.id,
            rule.law_ref.clone(),
            &mut errors,
            Some(&mut writers),
        );
    }

    // Step 5: derived pass 2.
    run_derived_pass(&derived, &mut doc.definitions, &mut errors);

    // Step 6: validation.
    errors.extend(validator::validate_definitions(&doc.definitions));

    // Step 7: attestations.
    for (name, att) in doc.attestations.iter_mut() {
        if att.signed {
            if let Some(on_sign) = att.on_sign.clone() {
                apply_action(
                    &on_sign,
                    &mut doc.definitions,
                    &derived,
                    &format!("attestation_{name}"),
                    att.law_ref.clone(),
                    &mut errors,
                    None,
                );
            }
        }
    }
    errors.extend(validator::validate_attestations(&doc.attestations));

    // Step 8: status determination.
    let status = validator::determine_status(&errors);

    // Step 9: return.
    doc.errors = errors;
    doc.status = Some(status);
    doc
}

/// Evaluates every derived field in insertion order and writes the
/// result back into `definitions` as a readonly, visible field (§4.4
/// steps 3 and 5 share this logic).
fn run_derived_pass(
    derived: &IndexMap<String, crate::document::DerivedField>,
    definitions: &mut IndexMap<String, Definition>,
    errors: &mut Vec<ValidationError>,
) {
    for (name, field) in derived {
        let value = {
            let mut ctx = EvalContext::new(definitions, derived);
            let value = ctx.eval(&field.eval);
            errors.extend(ctx.findings);
            value
        };
        write_derived_value(definitions, name, value);
    }
}

fn write_derived_value(definitions: &mut IndexMap<String, Definition>, name: &str, value: Value) {
    match definitions.get_mut(name) {
        Some(existing) => {
            existing.value = Some(value);
            existing.readonly = true;
        }
        None => {
            definitions.insert(
                name.to_string(),
                Definition {
                    def_type: infer_type(&value),
                    value: Some(value),
                    options: None,
                    label: None,
                    ui_class: None,
                    ui_message: None,
                    required: false,
                    readonly: true,
                    visible: Some(true),
                    min: None,
                    max: None,
                    step: None,
                    min_length: None,
                    max_length: None,
                    pattern: None,
                },
            );
        }
    }
}

/// Applies a rule/attestation action: `set` assignments, `ui_modify`
/// attribute overwrites, and an `error_msg` finding. `writers` tracks
/// which rule wrote each field during this `evaluate` call so that two
/// distinct rules writing the same field can be flagged as
/// `cycle_detected` per §3.2.
#[allow(clippy::too_many_arguments)]
fn apply_action(
    action: &Action,
    definitions: &mut IndexMap<String, Definition>,
    derived: &IndexMap<String, crate::document::DerivedField>,
    writer_id: &str,
    law_ref: Option<String>,
    errors: &mut Vec<ValidationError>,
    mut writers: Option<&mut HashMap<String, String>>,
) {
    if let Some(set) = &action.set {
        for (field, expr) in set {
            let value = {
                let mut ctx = EvalContext::new(definitions, derived);
                let value = ctx.eval(expr);
                errors.extend(ctx.findings);
                value
            };

            if let Some(writers) = writers.as_deref_mut() {
                if let Some(previous_writer) = writers.get(field) {
                    if previous_writer != writer_id {
                        errors.push(
                            ValidationError::new(
                                ValidationErrorKind::CycleDetected,
                                format!(
                                    "field '{field}' was written by both '{previous_writer}' and '{writer_id}'"
                                ),
                            )
                            .with_field(field.as_str()),
                        );
                    }
                }
                writers.insert(field.clone(), writer_id.to_string());
            }

            match definitions.get_mut(field) {
                Some(def) => def.value = Some(value),
                None => {
                    definitions.insert(
                        field.clone(),
                        Definition {
                            def_type: infer_type(&value),
                            value: Some(value),
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
                }
            }
        }
    }

    if let Some(ui_modify) = &action.ui_modify {
        for (field, attrs) in ui_modify {
            let Some(def) = definitions.get_mut(field) else {
                continue;
            };
            apply_ui_attrs(def, attrs);
        }
    }

    if let Some(message) = action.error_msg.as_ref().filter(|m| !m.is_empty()) {
        errors.push(
            ValidationError::new(ValidationErrorKind::ConstraintViolation, message.clone())
                .with_rule(writer_id)
                .with_law_ref(law_ref),
        );
    }
}

fn apply_ui_attrs(def: &mut Definition, attrs: &IndexMap<String, Value>) {
    for (attr, value) in attrs {
        match attr.as_str() {
            "visible" => def.visible = value.as_bool(),
            "required" => {
                if let Some(b) = value.as_bool() {
                    def.required = b;
                }
            }
            "min" => def.min = value.as_f64(),
            "max" => def.max = value.as_f64(),
            "step" => def.step = value.as_f64(),
            "min_length" => def.min_length = value.as_u64().map(|n| n as usize),
            "max_length" => def.max_length = value.as_u64().map(|n| n as usize),
            "pattern" => def.pattern = value.as_str().map(str::to_string),
            "ui_class" => def.ui_class = value.as_str().map(str::to_string),
            "ui_message" => def.ui_message = value.as_str().map(str::to_string),
            _ => {} // unknown attributes are ignored, per §3.1 Action
        }
    }
}

fn infer_type(value: &Value) -> DefType {
    match value {
        Value::Bool(_) => DefType::Boolean,
        Value::Number(_) => DefType::Number,
        _ => DefType::String,
    }
}
