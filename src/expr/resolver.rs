//! The expression resolver: recursively evaluates an expression tree
//! against the current definitions and derived fields.
//!
//! The resolver is pure except for two narrowly scoped writes: the
//! error accumulator (`runtime_warning`/`cycle_detected` findings) and
//! the derived-in-progress guard used to detect circular derived
//! references. Both are carried on [`EvalContext`], not as ambient
//! globals, so that nested evaluations (e.g. a derived field used
//! inside a rule's `when`, itself inside a `some` predicate) compose
//! without cross-talk.

use crate::document::{Definition, DerivedField, ValidationError, ValidationErrorKind};
use crate::expr::operators;
use crate::value::{get_nested, Value};
use indexmap::IndexMap;

/// Evaluation context threaded through a single resolver walk.
///
/// Borrows the current definitions and derived-field expressions
/// read-only; owns the two scoped mutable pieces of state described
/// above.
pub struct EvalContext<'a> {
    definitions: &'a IndexMap<String, Definition>,
    derived: &'a IndexMap<String, DerivedField>,
    /// Derived names currently being evaluated, used as the cycle guard
    /// from §4.4 step 3: re-entering a name already on this stack means
    /// a circular derived reference.
    active_derived: Vec<String>,
    /// Stack of "current iteration element" bindings for nested
    /// `some`/`all`/`none` predicates. `{var: ""}` resolves to the top
    /// of this stack; pushed/popped around predicate evaluation so that
    /// the previous element is restored on exit.
    element_stack: Vec<Value>,
    /// Findings accumulated during evaluation: `runtime_warning` for
    /// undefined variables/unknown operators, `cycle_detected` for
    /// derived cycles.
    pub findings: Vec<ValidationError>,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        definitions: &'a IndexMap<String, Definition>,
        derived: &'a IndexMap<String, DerivedField>,
    ) -> Self {
        Self {
            definitions,
            derived,
            active_derived: Vec::new(),
            element_stack: Vec::new(),
            findings: Vec::new(),
        }
    }

    /// Evaluates an expression tree, per the node classification in
    /// §4.1: single-key object = operator application, array = literal
    /// whose elements are themselves evaluated, anything else = literal.
    pub fn eval(&mut self, expr: &Value) -> Value {
        match expr {
            Value::Object(map) if map.len() == 1 => {
                let (op, arg) = map.iter().next().expect("len == 1");
                self.eval_operator(op, arg)
            }
            Value::Array(elements) => {
                Value::Array(elements.iter().map(|e| self.eval(e)).collect())
            }
            literal => literal.clone(),
        }
    }

    fn eval_operator(&mut self, op: &str, arg: &Value) -> Value {
        match op {
            "var" => self.eval_var(arg),
            other => operators::apply(other, arg, self),
        }
    }

    /// Implements the `var` operator: dotted lookup in derived (checked
    /// first), then definitions; empty path returns the current
    /// iteration element; missing root emits `runtime_warning` unless
    /// currently inside a collection iteration.
    fn eval_var(&mut self, arg: &Value) -> Value {
        let path = match arg.as_str() {
            Some(s) => s,
            None => {
                self.warn("var argument must be a string path".to_string());
                return Value::Null;
            }
        };

        if path.is_empty() {
            return self.element_stack.last().cloned().unwrap_or(Value::Null);
        }

        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        let rest: Vec<&str> = segments.collect();

        if self.derived.contains_key(root) {
            let value = self.eval_derived(root);
            return get_nested(&value, &rest);
        }

        if let Some(def) = self.definitions.get(root) {
            let value = def.value.clone().unwrap_or(Value::Null);
            return get_nested(&value, &rest);
        }

        if self.element_stack.is_empty() {
            self.warn(format!("undefined variable '{root}'"));
        }
        Value::Null
    }

    /// Evaluates a derived field's expression, guarding against cycles.
    fn eval_derived(&mut self, name: &str) -> Value {
        if self.active_derived.iter().any(|n| n == name) {
            self.findings.push(
                ValidationError::new(
                    ValidationErrorKind::CycleDetected,
                    format!("derived field '{name}' is part of a circular reference"),
                )
                .with_field(name),
            );
            return Value::Null;
        }

        let Some(field) = self.derived.get(name) else {
            return Value::Null;
        };
        let expr = field.eval.clone();

        self.active_derived.push(name.to_string());
        let result = self.eval(&expr);
        self.active_derived.pop();
        result
    }

    /// Evaluates `predicate` with `{var: ""}` bound to `element`,
    /// restoring the previous element on exit so nested iterations
    /// compose correctly.
    pub fn eval_with_element(&mut self, element: Value, predicate: &Value) -> Value {
        self.element_stack.push(element);
        let result = self.eval(predicate);
        self.element_stack.pop();
        result
    }

    /// Records a `runtime_warning` finding.
    pub fn warn(&mut self, message: String) {
        self.findings
            .push(ValidationError::new(ValidationErrorKind::RuntimeWarning, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DefType;
    use serde_json::json;

    fn defs(pairs: &[(&str, Value)]) -> IndexMap<String, Definition> {
        pairs
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    Definition {
                        def_type: DefType::Number,
                        value: Some(value.clone()),
                        options: None,
                        label: None,
                        ui_class: None,
                        ui_message: None,
                        required: false,
                        readonly: false,
                        visible: None,
                        min: None,
                        max: None,
                        step: None,
                        min_length: None,
                        max_length: None,
                        pattern: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn literal_passthrough() {
        let defs = IndexMap::new();
        let derived = IndexMap::new();
        let mut ctx = EvalContext::new(&defs, &derived);
        assert_eq!(ctx.eval(&json!(42)), json!(42));
        assert_eq!(ctx.eval(&json!("hi")), json!("hi"));
        assert_eq!(ctx.eval(&json!({"a": 1, "b": 2})), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn var_dotted_lookup() {
        let defs = defs(&[("income", json!(45000))]);
        let derived = IndexMap::new();
        let mut ctx = EvalContext::new(&defs, &derived);
        assert_eq!(ctx.eval(&json!({"var": "income"})), json!(45000));
    }

    #[test]
    fn var_missing_root_warns() {
        let defs = IndexMap::new();
        let derived = IndexMap::new();
        let mut ctx = EvalContext::new(&defs, &derived);
        assert_eq!(ctx.eval(&json!({"var": "nope"})), Value::Null);
        assert_eq!(ctx.findings.len(), 1);
        assert_eq!(ctx.findings[0].kind, ValidationErrorKind::RuntimeWarning);
    }

    #[test]
    fn derived_self_reference_cycle_is_guarded() {
        let defs = IndexMap::new();
        let mut derived = IndexMap::new();
        derived.insert(
            "loop".to_string(),
            DerivedField {
                eval: json!({"var": "loop"}),
            },
        );
        let mut ctx = EvalContext::new(&defs, &derived);
        assert_eq!(ctx.eval(&json!({"var": "loop"})), Value::Null);
        assert!(ctx
            .findings
            .iter()
            .any(|f| f.kind == ValidationErrorKind::CycleDetected));
    }

    #[test]
    fn array_literal_evaluates_elements() {
        let defs = defs(&[("x", json!(5))]);
        let derived = IndexMap::new();
        let mut ctx = EvalContext::new(&defs, &derived);
        let result = ctx.eval(&json!([1, {"var": "x"}, 3]));
        assert_eq!(result, json!([1, 5, 3]));
    }
}
