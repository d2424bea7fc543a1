//! Runtime value representation and coercion helpers.
//!
//! The wire form of a document is JSON, and the engine deliberately does
//! not distinguish integers from floats at runtime, so the runtime
//! [`Value`] type is `serde_json::Value` itself rather than a bespoke
//! closed sum. Expression trees are also plain [`Value`]s: an operator
//! application is a single-key object, a literal object has any other
//! key count, and everything else (including arrays, whose elements are
//! themselves sub-expressions) is a literal. This mirrors the data model
//! in the specification exactly and avoids a redundant AST layer for a
//! language whose syntax *is* its wire format.
//!
//! Coercion rules are localized here in `as_number`, `as_date`,
//! `values_equal`, and `truthy`, per the design notes: callers never
//! hand-roll type coercion inline.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// A document value, expression node, or expression literal.
pub type Value = serde_json::Value;

/// Returns `true` iff `value` is falsy per the truthiness table in §4.1:
/// `null`, `false`, numeric `0`, empty string, empty array, and empty
/// object are falsy; everything else is truthy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Attempts to coerce `value` to a number. Strings are *not* silently
/// converted (per §4.1); only `Value::Number` yields `Some`.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Parses a date-like value using the three formats accepted on the
/// wire: full RFC3339 timestamp, date-time without a zone, or a bare
/// date. Returns `None` on any unparseable input (never an error — per
/// the operator table, date parsing failure becomes `false` in
/// comparisons, not a propagated error).
pub fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(
            d.and_hms_opt(0, 0, 0).expect("midnight is always valid"),
            Utc,
        ));
    }
    None
}

/// Compares two values for equality per §4.1: if both operands coerce
/// to numbers, compare numerically; otherwise compare string
/// representations. `null == null` is true; `null == x` is false for
/// any non-null `x`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return a.is_null() && b.is_null();
    }
    if let (Some(na), Some(nb)) = (as_number(a), as_number(b)) {
        return na == nb;
    }
    stringify(a) == stringify(b)
}

/// Renders a value the way `==`'s stringification fallback does. This
/// intentionally produces the counterintuitive matches documented in
/// the design notes (e.g. `"1"` equals the number `1`): the behavior is
/// preserved for compatibility, not accidental.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                n.to_string()
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Navigates nested object fields by dotted path segment. A missing
/// segment at any depth yields `Value::Null`, per §4.1's "a missing
/// segment yields null".
pub fn get_nested(mut value: &Value, segments: &[&str]) -> Value {
    for segment in segments {
        match value.as_object().and_then(|o| o.get(*segment)) {
            Some(v) => value = v,
            None => return Value::Null,
        }
    }
    value.clone()
}

/// Returns the empty-string-or-absent check used for `required` string
/// and `select` fields: `null`, a missing value, or an empty string all
/// count as "missing".
pub fn is_missing_scalar(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthy_table() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!([])));
        assert!(!truthy(&json!({})));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!([1])));
    }

    #[test]
    fn as_number_rejects_strings() {
        assert_eq!(as_number(&json!("42")), None);
        assert_eq!(as_number(&json!(42)), Some(42.0));
    }

    #[test]
    fn equality_null_semantics() {
        assert!(values_equal(&Value::Null, &Value::Null));
        assert!(!values_equal(&Value::Null, &json!(0)));
        assert!(!values_equal(&json!(0), &Value::Null));
    }

    #[test]
    fn equality_via_stringification() {
        assert!(values_equal(&json!("1"), &json!(1)));
        assert!(values_equal(&json!("true"), &json!(true)));
    }

    #[test]
    fn date_parsing_accepts_three_formats() {
        assert!(as_date(&json!("2024-01-01")).is_some());
        assert!(as_date(&json!("2024-01-01T10:30:00")).is_some());
        assert!(as_date(&json!("2024-01-01T10:30:00Z")).is_some());
        assert!(as_date(&json!("not a date")).is_none());
    }
}
