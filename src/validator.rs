//! Field and attestation validation (§4.4 steps 6–7) and status
//! determination (§4.4 step 8).

use crate::document::{
    Attestation, DefType, Definition, Status, ValidationError, ValidationErrorKind,
};
use crate::value::{as_number, is_missing_scalar, Value};
use indexmap::IndexMap;
use regex::Regex;

/// Validates every definition's type/constraint invariants, per §4.4
/// step 6.
pub fn validate_definitions(definitions: &IndexMap<String, Definition>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (name, def) in definitions {
        errors.extend(validate_definition(name, def));
    }
    errors
}

fn validate_definition(name: &str, def: &Definition) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if def.required && is_missing_required(def) {
        errors.push(
            ValidationError::new(ValidationErrorKind::MissingRequired, format!("'{name}' is required"))
                .with_field(name),
        );
    }

    // Array-valued fields skip scalar type/range checks (§3.2, §9 open
    // question): the declared type describes the element type used by
    // collection operators, and element-level checks aren't performed.
    if matches!(def.value, Some(Value::Array(_))) {
        return errors;
    }

    let Some(value) = def.value.as_ref().filter(|v| !v.is_null()) else {
        return errors;
    };

    match def.def_type {
        DefType::String | DefType::Select => {
            match value.as_str() {
                Some(s) => {
                    if def.def_type == DefType::Select {
                        let in_options = def
                            .options
                            .as_ref()
                            .map(|opts| opts.iter().any(|o| o == s))
                            .unwrap_or(false);
                        if !in_options {
                            errors.push(
                                ValidationError::new(
                                    ValidationErrorKind::ConstraintViolation,
                                    format!("'{name}' value '{s}' is not one of its options"),
                                )
                                .with_field(name),
                            );
                        }
                    }
                    errors.extend(validate_string_constraints(name, s, def));
                }
                None => errors.push(type_mismatch(name, "string")),
            }
        }
        DefType::Number | DefType::Currency => match as_number(value) {
            Some(n) => errors.extend(validate_numeric_constraints(name, n, def)),
            None => errors.push(type_mismatch(name, "number")),
        },
        DefType::Boolean => {
            if value.as_bool().is_none() {
                errors.push(type_mismatch(name, "boolean"));
            }
        }
        DefType::Date => {
            if crate::value::as_date(value).is_none() {
                errors.push(type_mismatch(name, "date"));
            }
        }
        DefType::Attestation => match value.as_bool() {
            Some(signed) => {
                if def.required && !signed {
                    errors.push(
                        ValidationError::new(
                            ValidationErrorKind::AttestationIncomplete,
                            format!("'{name}' is a required attestation but is not affirmed"),
                        )
                        .with_field(name),
                    );
                }
            }
            None => errors.push(type_mismatch(name, "boolean")),
        },
    }

    errors
}

fn is_missing_required(def: &Definition) -> bool {
    match def.def_type {
        DefType::String | DefType::Select => is_missing_scalar(def.value.as_ref()),
        _ => def.value.is_none() || matches!(def.value, Some(Value::Null)),
    }
}

fn type_mismatch(name: &str, expected: &str) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::TypeMismatch,
        format!("'{name}' does not have the declared type ({expected})"),
    )
    .with_field(name)
}

fn validate_string_constraints(name: &str, s: &str, def: &Definition) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let len = s.chars().count();

    if let Some(min_length) = def.min_length {
        if len < min_length {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::ConstraintViolation,
                    format!("'{name}' is shorter than min_length {min_length}"),
                )
                .with_field(name),
            );
        }
    }
    if let Some(max_length) = def.max_length {
        if len > max_length {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::ConstraintViolation,
                    format!("'{name}' is longer than max_length {max_length}"),
                )
                .with_field(name),
            );
        }
    }
    if let Some(pattern) = &def.pattern {
        match Regex::new(pattern) {
            Ok(re) if !re.is_match(s) => {
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::ConstraintViolation,
                        format!("'{name}' does not match its pattern"),
                    )
                    .with_field(name),
                );
            }
            Ok(_) => {}
            Err(_) => {
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::RuntimeWarning,
                        format!("'{name}' has an invalid pattern regex"),
                    )
                    .with_field(name),
                );
            }
        }
    }
    errors
}

fn validate_numeric_constraints(name: &str, n: f64, def: &Definition) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if let Some(min) = def.min {
        if n < min {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::ConstraintViolation,
                    format!("'{name}' is below its minimum {min}"),
                )
                .with_field(name),
            );
        }
    }
    if let Some(max) = def.max {
        if n > max {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::ConstraintViolation,
                    format!("'{name}' is above its maximum {max}"),
                )
                .with_field(name),
            );
        }
    }
    if let Some(step) = def.step {
        if step > 0.0 {
            let base = def.min.unwrap_or(0.0);
            let remainder = (n - base) / step;
            if (remainder - remainder.round()).abs() > 1e-9 {
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::ConstraintViolation,
                        format!("'{name}' is not a multiple of step {step}"),
                    )
                    .with_field(name),
                );
            }
        }
    }
    errors
}

/// Validates attestation completeness, per §4.4 step 7 (the
/// required/signed/evidence checks; `on_sign` execution is an
/// orchestration concern handled by the caller before this runs).
pub fn validate_attestations(attestations: &IndexMap<String, Attestation>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (name, att) in attestations {
        if att.required && !att.signed {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::AttestationIncomplete,
                    format!("attestation '{name}' is required but not signed"),
                )
                .with_field(name)
                .with_law_ref(att.law_ref.clone()),
            );
            continue;
        }
        if att.required && att.signed {
            let has_audit_id = att
                .evidence
                .as_ref()
                .and_then(|e| e.provider_audit_id.as_ref())
                .map(|s| !s.is_empty())
                .unwrap_or(false);
            if !has_audit_id {
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::AttestationIncomplete,
                        format!("attestation '{name}' is signed but lacks evidence"),
                    )
                    .with_field(name)
                    .with_law_ref(att.law_ref.clone()),
                );
            }
        }
    }
    errors
}

/// Determines the overall document status from the accumulated error
/// kinds, per §4.4 step 8 (first matching rule wins).
pub fn determine_status(errors: &[ValidationError]) -> Status {
    if errors.iter().any(|e| e.kind == ValidationErrorKind::TypeMismatch) {
        return Status::Invalid;
    }
    if errors.iter().any(|e| {
        matches!(
            e.kind,
            ValidationErrorKind::MissingRequired | ValidationErrorKind::AttestationIncomplete
        )
    }) {
        return Status::Incomplete;
    }
    if errors
        .iter()
        .any(|e| e.kind == ValidationErrorKind::ConstraintViolation)
    {
        return Status::Invalid;
    }
    Status::Ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn string_def(value: Option<Value>, required: bool) -> Definition {
        Definition {
            def_type: DefType::String,
            value,
            options: None,
            label: None,
            ui_class: None,
            ui_message: None,
            required,
            readonly: false,
            visible: None,
            min: None,
            max: None,
            step: None,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    #[test]
    fn empty_required_string_is_missing() {
        let mut defs = IndexMap::new();
        defs.insert("name".to_string(), string_def(Some(json!("")), true));
        let errors = validate_definitions(&defs);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::MissingRequired);
    }

    #[test]
    fn select_rejects_out_of_options_value() {
        let mut def = string_def(Some(json!("z")), false);
        def.def_type = DefType::Select;
        def.options = Some(vec!["a".into(), "b".into()]);
        let mut defs = IndexMap::new();
        defs.insert("choice".to_string(), def);
        let errors = validate_definitions(&defs);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::ConstraintViolation);
    }

    #[test]
    fn array_valued_number_field_skips_scalar_checks() {
        let mut def = string_def(Some(json!([1, 2, 3])), false);
        def.def_type = DefType::Number;
        def.min = Some(10.0);
        let mut defs = IndexMap::new();
        defs.insert("scores".to_string(), def);
        let errors = validate_definitions(&defs);
        assert!(errors.is_empty());
    }

    #[test]
    fn status_priority_type_mismatch_wins() {
        let errors = vec![
            ValidationError::new(ValidationErrorKind::MissingRequired, "x"),
            ValidationError::new(ValidationErrorKind::TypeMismatch, "y"),
        ];
        assert_eq!(determine_status(&errors), Status::Invalid);
    }

    #[test]
    fn status_incomplete_without_type_mismatch() {
        let errors = vec![ValidationError::new(ValidationErrorKind::MissingRequired, "x")];
        assert_eq!(determine_status(&errors), Status::Incomplete);
    }

    #[test]
    fn status_ready_on_warnings_only() {
        let errors = vec![
            ValidationError::new(ValidationErrorKind::RuntimeWarning, "x"),
            ValidationError::new(ValidationErrorKind::CycleDetected, "y"),
        ];
        assert_eq!(determine_status(&errors), Status::Ready);
    }
}
