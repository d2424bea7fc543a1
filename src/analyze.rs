//! The static analyzer (§4.6): a single bottom-up pass over a document
//! that reports structural, referential, type, temporal, conflict,
//! cycle, and deprecation issues without executing anything.

use crate::document::{Action, DefType, Document};
use crate::value::Value;
use regex::Regex;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    EmptyDefinitions,
    EmptyRuleId,
    DuplicateRuleId,
    RuleMissingWhenOrThen,
    SelectMissingOptions,
    MinGreaterThanMax,
    MinLengthGreaterThanMaxLength,
    InvalidRegex,
    AttestationMissingStatement,
    TemporalBranchMissingVersion,
    DerivedMissingEval,
    IdCollision,
    UndeclaredVar,
    RuleLogicVersionNotInTemporalMap,
    UndeclaredSetOrUiModifyTarget,
    UndeclaredStateModelInput,
    UnknownOperator,
    ArithmeticOnNonNumeric,
    ComparisonMixedTypes,
    SetTypeMismatch,
    ZeroLengthRange,
    OverlappingRanges,
    FieldWrittenByMultipleRules,
    DerivedCycle,
    NumericConstraintsOnNonNumericField,
    StringConstraintsOnNonStringField,
}

/// One analyzer finding.
#[derive(Debug, Clone)]
pub struct Issue {
    pub severity: Severity,
    pub code: IssueCode,
    pub field_id: Option<String>,
    pub rule_id: Option<String>,
    pub path: Option<String>,
    pub message: String,
}

impl Issue {
    fn new(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            field_id: None,
            rule_id: None,
            path: None,
            message: message.into(),
        }
    }

    fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    fn with_field(mut self, field_id: impl Into<String>) -> Self {
        self.field_id = Some(field_id.into());
        self
    }

    fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }
}

/// Reserved for future toggles (e.g. disabling individual check
/// families); empty today since nothing in §4.6 is optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {}

/// The result of an `analyze` call: valid iff no `Severity::Error`
/// issue was produced.
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub valid: bool,
    pub issues: Vec<Issue>,
}

/// Runs every §4.6 check against `document` and returns the ordered
/// issue list.
#[tracing::instrument(skip(document, _options))]
pub fn analyze(document: &Document, _options: AnalyzeOptions) -> AnalyzeOutcome {
    let mut issues = Vec::new();

    structural_checks(document, &mut issues);
    reference_checks(document, &mut issues);
    type_checks(document, &mut issues);
    temporal_checks(document, &mut issues);
    conflict_checks(document, &mut issues);
    cycle_checks(document, &mut issues);
    deprecation_checks(document, &mut issues);

    let valid = !issues.iter().any(|i| i.severity == Severity::Error);
    AnalyzeOutcome { valid, issues }
}

fn def_expr_type(def_type: DefType) -> ExprType {
    match def_type {
        DefType::Number | DefType::Currency => ExprType::Number,
        DefType::Boolean | DefType::Attestation => ExprType::Boolean,
        DefType::String | DefType::Select | DefType::Date => ExprType::String,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExprType {
    Boolean,
    Number,
    String,
    Unknown,
}

/// Walks an expression tree exactly the way the resolver classifies
/// nodes (§4.1), invoking `visit(op, arg)` for every operator
/// application encountered, including nested ones.
fn walk_expr(expr: &Value, visit: &mut impl FnMut(&str, &Value)) {
    match expr {
        Value::Object(map) if map.len() == 1 => {
            let (op, arg) = map.iter().next().expect("len == 1");
            visit(op, arg);
            walk_expr(arg, visit);
        }
        Value::Array(items) => {
            for item in items {
                walk_expr(item, visit);
            }
        }
        _ => {}
    }
}

const KNOWN_OPERATORS: &[&str] = &[
    "var", "==", "!=", "<", "<=", ">", ">=", "and", "or", "not", "!", "if", "+", "-", "*", "/",
    "before", "after", "in", "some", "all", "none",
];

fn infer_type(
    expr: &Value,
    definitions: &std::collections::HashMap<String, DefType>,
    derived: &HashSet<String>,
    depth: usize,
) -> ExprType {
    if depth > 32 {
        return ExprType::Unknown; // cyclic/pathological expression, bail rather than recurse forever
    }
    match expr {
        Value::Bool(_) => ExprType::Boolean,
        Value::Number(_) => ExprType::Number,
        Value::String(_) => ExprType::String,
        Value::Object(map) if map.len() == 1 => {
            let (op, arg) = map.iter().next().expect("len == 1");
            match op.as_str() {
                "var" => {
                    let root = arg.as_str().and_then(|s| s.split('.').next()).unwrap_or("");
                    // A derived field's own inferred type would require
                    // following its `eval` recursively; treated as
                    // unknown rather than resolved transitively.
                    definitions
                        .get(root)
                        .map(|def_type| def_expr_type(*def_type))
                        .unwrap_or(ExprType::Unknown)
                }
                "==" | "!=" | "<" | "<=" | ">" | ">=" | "and" | "or" | "not" | "!" | "before"
                | "after" | "in" | "some" | "all" | "none" => ExprType::Boolean,
                "+" | "-" | "*" | "/" => ExprType::Number,
                "if" => {
                    let exprs: Vec<&Value> = match arg {
                        Value::Array(items) => items.iter().collect(),
                        other => vec![other],
                    };
                    exprs
                        .get(1)
                        .map(|e| infer_type(e, definitions, derived, depth + 1))
                        .unwrap_or(ExprType::Unknown)
                }
                _ => ExprType::Unknown,
            }
        }
        _ => ExprType::Unknown,
    }
}

fn structural_checks(document: &Document, issues: &mut Vec<Issue>) {
    if document.definitions.is_empty() {
        issues.push(Issue::error(IssueCode::EmptyDefinitions, "document has no definitions"));
    }

    let mut seen_rule_ids = HashSet::new();
    for rule in &document.logic_tree {
        if rule.id.trim().is_empty() {
            issues.push(Issue::error(IssueCode::EmptyRuleId, "rule has an empty id"));
        } else if !seen_rule_ids.insert(rule.id.clone()) {
            issues.push(
                Issue::error(IssueCode::DuplicateRuleId, format!("rule id '{}' is duplicated", rule.id))
                    .with_rule(rule.id.clone()),
            );
        }
        if rule.when.is_none() || rule.then.is_none() {
            issues.push(
                Issue::error(
                    IssueCode::RuleMissingWhenOrThen,
                    format!("rule '{}' is missing 'when' or 'then'", rule.id),
                )
                .with_rule(rule.id.clone()),
            );
        }
    }

    for (name, def) in &document.definitions {
        if def.def_type == DefType::Select {
            let empty = def.options.as_ref().map(|o| o.is_empty()).unwrap_or(true);
            if empty {
                issues.push(
                    Issue::error(
                        IssueCode::SelectMissingOptions,
                        format!("'{name}' is a select field with no options"),
                    )
                    .with_field(name),
                );
            }
        }
        if let (Some(min), Some(max)) = (def.min, def.max) {
            if min > max {
                issues.push(
                    Issue::error(IssueCode::MinGreaterThanMax, format!("'{name}' has min > max")).with_field(name),
                );
            }
        }
        if let (Some(min_len), Some(max_len)) = (def.min_length, def.max_length) {
            if min_len > max_len {
                issues.push(
                    Issue::error(
                        IssueCode::MinLengthGreaterThanMaxLength,
                        format!("'{name}' has min_length > max_length"),
                    )
                    .with_field(name),
                );
            }
        }
        if let Some(pattern) = &def.pattern {
            if Regex::new(pattern).is_err() {
                issues.push(
                    Issue::error(IssueCode::InvalidRegex, format!("'{name}' has an invalid pattern regex"))
                        .with_field(name),
                );
            }
        }
    }

    for (name, att) in &document.attestations {
        let empty = att.statement.as_deref().map(str::trim).unwrap_or("").is_empty();
        if empty {
            issues.push(
                Issue::error(
                    IssueCode::AttestationMissingStatement,
                    format!("attestation '{name}' has no statement"),
                )
                .with_field(name),
            );
        }
    }

    for branch in &document.temporal_map {
        if branch.logic_version.trim().is_empty() {
            issues.push(Issue::error(
                IssueCode::TemporalBranchMissingVersion,
                "temporal branch has an empty logic_version",
            ));
        }
    }

    if let Some(state_model) = &document.state_model {
        for (name, field) in &state_model.derived {
            if field.eval.is_null() {
                issues.push(
                    Issue::error(IssueCode::DerivedMissingEval, format!("derived field '{name}' has no eval"))
                        .with_field(name),
                );
            }
        }
    }

    id_collision_check(document, issues);
}

fn id_collision_check(document: &Document, issues: &mut Vec<Issue>) {
    let mut owners: HashMap<String, &'static str> = HashMap::new();
    let mut record = |id: &str, namespace: &'static str, issues: &mut Vec<Issue>| {
        if id.is_empty() {
            return;
        }
        match owners.get(id) {
            Some(existing) if *existing != namespace => {
                issues.push(Issue::error(
                    IssueCode::IdCollision,
                    format!("id '{id}' is used in both {existing} and {namespace}"),
                ));
            }
            _ => {
                owners.insert(id.to_string(), namespace);
            }
        }
    };

    for name in document.definitions.keys() {
        record(name, "definition", issues);
    }
    for rule in &document.logic_tree {
        record(&rule.id, "rule", issues);
    }
    for name in document.attestations.keys() {
        record(name, "attestation", issues);
    }
    if let Some(sm) = &document.state_model {
        for name in sm.derived.keys() {
            record(name, "derived", issues);
        }
    }
    for branch in &document.temporal_map {
        record(&branch.logic_version, "temporal_version", issues);
    }
}

fn reference_checks(document: &Document, issues: &mut Vec<Issue>) {
    let derived_names: HashSet<String> = document
        .state_model
        .as_ref()
        .map(|sm| sm.derived.keys().cloned().collect())
        .unwrap_or_default();
    let known: HashSet<&str> = document
        .definitions
        .keys()
        .map(String::as_str)
        .chain(derived_names.iter().map(String::as_str))
        .collect();
    let temporal_versions: HashSet<&str> = document
        .temporal_map
        .iter()
        .map(|b| b.logic_version.as_str())
        .collect();

    let mut check_expr = |expr: &Value, rule_id: Option<&str>| {
        walk_expr(expr, &mut |op, arg| {
            if op == "var" {
                if let Some(path) = arg.as_str() {
                    let root = path.split('.').next().unwrap_or("");
                    if !root.is_empty() && !known.contains(root) {
                        let mut issue = Issue::warning(
                            IssueCode::UndeclaredVar,
                            format!("'var' references undeclared name '{root}'"),
                        )
                        .with_field(root);
                        if let Some(rid) = rule_id {
                            issue = issue.with_rule(rid);
                        }
                        issues.push(issue);
                    }
                }
            } else if !KNOWN_OPERATORS.contains(&op) {
                let mut issue =
                    Issue::warning(IssueCode::UnknownOperator, format!("unknown operator '{op}'"));
                if let Some(rid) = rule_id {
                    issue = issue.with_rule(rid);
                }
                issues.push(issue);
            }
        });
    };

    for rule in &document.logic_tree {
        if let Some(when) = &rule.when {
            check_expr(when, Some(rule.id.as_str()));
        }
        if let Some(version) = &rule.logic_version {
            if !temporal_versions.contains(version.as_str()) {
                issues.push(
                    Issue::warning(
                        IssueCode::RuleLogicVersionNotInTemporalMap,
                        format!("rule '{}' references logic_version '{version}' not present in the temporal map", rule.id),
                    )
                    .with_rule(rule.id.clone()),
                );
            }
        }
        if let Some(action) = &rule.then {
            check_action_targets(action, &document.definitions, Some(rule.id.as_str()), issues);
        }
    }

    if let Some(sm) = &document.state_model {
        for field in sm.derived.values() {
            check_expr(&field.eval, None);
        }
        for input in &sm.inputs {
            if !document.definitions.contains_key(input) {
                issues.push(
                    Issue::warning(
                        IssueCode::UndeclaredStateModelInput,
                        format!("state_model.inputs references undeclared name '{input}'"),
                    )
                    .with_field(input.clone()),
                );
            }
        }
    }

    for att in document.attestations.values() {
        if let Some(on_sign) = &att.on_sign {
            check_action_targets(on_sign, &document.definitions, None, issues);
        }
    }
}

fn check_action_targets(
    action: &Action,
    definitions: &indexmap::IndexMap<String, crate::document::Definition>,
    rule_id: Option<&str>,
    issues: &mut Vec<Issue>,
) {
    if let Some(set) = &action.set {
        for field in set.keys() {
            if !definitions.contains_key(field) {
                let mut issue = Issue::warning(
                    IssueCode::UndeclaredSetOrUiModifyTarget,
                    format!("'set' targets undeclared field '{field}'"),
                )
                .with_field(field.clone());
                if let Some(rid) = rule_id {
                    issue = issue.with_rule(rid);
                }
                issues.push(issue);
            }
        }
    }
    if let Some(ui_modify) = &action.ui_modify {
        for field in ui_modify.keys() {
            if !definitions.contains_key(field) {
                let mut issue = Issue::warning(
                    IssueCode::UndeclaredSetOrUiModifyTarget,
                    format!("'ui_modify' targets undeclared field '{field}'"),
                )
                .with_field(field.clone());
                if let Some(rid) = rule_id {
                    issue = issue.with_rule(rid);
                }
                issues.push(issue);
            }
        }
    }
}

fn type_checks(document: &Document, issues: &mut Vec<Issue>) {
    let def_types: std::collections::HashMap<String, DefType> = document
        .definitions
        .iter()
        .map(|(name, def)| (name.clone(), def.def_type))
        .collect();
    let derived_names: HashSet<String> = document
        .state_model
        .as_ref()
        .map(|sm| sm.derived.keys().cloned().collect())
        .unwrap_or_default();

    let mut check_arithmetic_and_comparisons = |expr: &Value, rule_id: Option<&str>| {
        walk_expr(expr, &mut |op, arg| {
            let exprs: Vec<&Value> = match arg {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            match op {
                "+" | "-" | "*" | "/" => {
                    for e in &exprs {
                        let t = infer_type(e, &def_types, &derived_names, 0);
                        if t != ExprType::Number && t != ExprType::Unknown {
                            let mut issue = Issue::error(
                                IssueCode::ArithmeticOnNonNumeric,
                                format!("arithmetic operator '{op}' applied to a non-numeric operand"),
                            );
                            if let Some(rid) = rule_id {
                                issue = issue.with_rule(rid);
                            }
                            issues_push_once(issues, issue);
                        }
                    }
                }
                "<" | "<=" | ">" | ">=" => {
                    if let (Some(a), Some(b)) = (exprs.first(), exprs.get(1)) {
                        let ta = infer_type(a, &def_types, &derived_names, 0);
                        let tb = infer_type(b, &def_types, &derived_names, 0);
                        if ta != ExprType::Unknown && tb != ExprType::Unknown && ta != tb {
                            let mut issue = Issue::warning(
                                IssueCode::ComparisonMixedTypes,
                                format!("comparison operator '{op}' applied to operands of different types"),
                            );
                            if let Some(rid) = rule_id {
                                issue = issue.with_rule(rid);
                            }
                            issues.push(issue);
                        }
                    }
                }
                _ => {}
            }
        });
    };

    for rule in &document.logic_tree {
        if let Some(when) = &rule.when {
            check_arithmetic_and_comparisons(when, Some(rule.id.as_str()));
        }
        if let Some(action) = &rule.then {
            check_set_types(action, &def_types, &derived_names, Some(rule.id.as_str()), issues);
        }
    }
    if let Some(sm) = &document.state_model {
        for field in sm.derived.values() {
            check_arithmetic_and_comparisons(&field.eval, None);
        }
    }
    for att in document.attestations.values() {
        if let Some(on_sign) = &att.on_sign {
            check_set_types(on_sign, &def_types, &derived_names, None, issues);
        }
    }
}

/// Arithmetic findings are cheap to duplicate (one per nested sub-expr
/// hit by the same operator); dedupe by message+rule to keep the
/// issue list readable.
fn issues_push_once(issues: &mut Vec<Issue>, issue: Issue) {
    let dup = issues
        .iter()
        .any(|i| i.code == issue.code && i.message == issue.message && i.rule_id == issue.rule_id);
    if !dup {
        issues.push(issue);
    }
}

fn check_set_types(
    action: &Action,
    def_types: &std::collections::HashMap<String, DefType>,
    derived_names: &HashSet<String>,
    rule_id: Option<&str>,
    issues: &mut Vec<Issue>,
) {
    let Some(set) = &action.set else { return };
    for (field, expr) in set {
        let Some(def_type) = def_types.get(field) else {
            continue; // already flagged as an undeclared-target reference warning
        };
        let target = def_expr_type(*def_type);
        let inferred = infer_type(expr, def_types, derived_names, 0);
        if inferred != ExprType::Unknown && inferred != target {
            let mut issue = Issue::warning(
                IssueCode::SetTypeMismatch,
                format!("'set' assigns to '{field}' a value whose inferred type disagrees with its declared type"),
            )
            .with_field(field.clone());
            if let Some(rid) = rule_id {
                issue = issue.with_rule(rid);
            }
            issues.push(issue);
        }
    }
}

fn temporal_checks(document: &Document, issues: &mut Vec<Issue>) {
    let mut seen: Vec<(Option<chrono::DateTime<chrono::Utc>>, Option<chrono::DateTime<chrono::Utc>>)> = Vec::new();
    for branch in &document.temporal_map {
        let start = crate::value::as_date(&Value::String(branch.valid_range.start.clone()));
        let end = branch
            .valid_range
            .end
            .as_ref()
            .and_then(|e| crate::value::as_date(&Value::String(e.clone())));

        if let (Some(s), Some(e)) = (start, end) {
            if s == e {
                issues.push(Issue::warning(
                    IssueCode::ZeroLengthRange,
                    format!("temporal branch '{}' has a zero-length range", branch.logic_version),
                ));
            }
        }
        if let Some(s) = start {
            let overlaps = seen
                .iter()
                .any(|(ps, pe)| ps.map(|ps| s >= ps).unwrap_or(false) && pe.map(|pe| s <= pe).unwrap_or(true));
            if overlaps {
                issues.push(Issue::warning(
                    IssueCode::OverlappingRanges,
                    format!("temporal branch '{}' overlaps a previous branch's range", branch.logic_version),
                ));
            }
        }
        seen.push((start, end));
    }
}

fn conflict_checks(document: &Document, issues: &mut Vec<Issue>) {
    let mut writers: HashMap<String, Vec<String>> = HashMap::new();
    for rule in &document.logic_tree {
        if let Some(action) = &rule.then {
            if let Some(set) = &action.set {
                for field in set.keys() {
                    writers.entry(field.clone()).or_default().push(rule.id.clone());
                }
            }
        }
    }
    for (field, rule_ids) in writers {
        if rule_ids.len() > 1 {
            issues.push(Issue::warning(
                IssueCode::FieldWrittenByMultipleRules,
                format!("field '{field}' is written by more than one rule's 'set': {}", rule_ids.join(", ")),
            ).with_field(field));
        }
    }
}

fn cycle_checks(document: &Document, issues: &mut Vec<Issue>) {
    let Some(sm) = &document.state_model else { return };
    if sm.derived.is_empty() {
        return;
    }

    let mut edges: HashMap<String, Vec<String>> = HashMap::new();
    for (name, field) in &sm.derived {
        let mut refs = Vec::new();
        walk_expr(&field.eval, &mut |op, arg| {
            if op == "var" {
                if let Some(path) = arg.as_str() {
                    let root = path.split('.').next().unwrap_or("").to_string();
                    if root != *name && sm.derived.contains_key(&root) {
                        refs.push(root);
                    }
                }
            }
        });
        edges.insert(name.clone(), refs);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut colors: HashMap<String, Color> = sm.derived.keys().map(|k| (k.clone(), Color::White)).collect();
    let mut found_cycle = HashSet::new();

    fn visit(
        node: &str,
        edges: &HashMap<String, Vec<String>>,
        colors: &mut HashMap<String, Color>,
        found_cycle: &mut HashSet<String>,
    ) {
        colors.insert(node.to_string(), Color::Gray);
        if let Some(neighbors) = edges.get(node) {
            for next in neighbors {
                match colors.get(next).copied().unwrap_or(Color::White) {
                    Color::White => visit(next, edges, colors, found_cycle),
                    Color::Gray => {
                        found_cycle.insert(node.to_string());
                    }
                    Color::Black => {}
                }
            }
        }
        colors.insert(node.to_string(), Color::Black);
    }

    for name in sm.derived.keys() {
        if colors.get(name).copied() == Some(Color::White) {
            visit(name, &edges, &mut colors, &mut found_cycle);
        }
    }

    for name in found_cycle {
        issues.push(
            Issue::error(IssueCode::DerivedCycle, format!("derived field '{name}' is part of a circular reference"))
                .with_field(name),
        );
    }
}

fn deprecation_checks(document: &Document, issues: &mut Vec<Issue>) {
    for (name, def) in &document.definitions {
        let has_numeric_constraints = def.min.is_some() || def.max.is_some() || def.step.is_some();
        if has_numeric_constraints && !def.def_type.is_numeric() {
            issues.push(
                Issue::warning(
                    IssueCode::NumericConstraintsOnNonNumericField,
                    format!("'{name}' has numeric constraints but is not a numeric type"),
                )
                .with_field(name),
            );
        }
        let has_string_constraints = def.min_length.is_some() || def.max_length.is_some() || def.pattern.is_some();
        if has_string_constraints && !def.def_type.is_stringy() {
            issues.push(
                Issue::warning(
                    IssueCode::StringConstraintsOnNonStringField,
                    format!("'{name}' has string constraints but is not a string type"),
                )
                .with_field(name),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Action, DefType as DT, DerivedField, Definition, Rule, StateModel};
    use serde_json::json;

    fn def(def_type: DT) -> Definition {
        Definition {
            def_type,
            value: None,
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
        }
    }

    #[test]
    fn empty_definitions_is_an_error() {
        let doc = Document::default();
        let outcome = analyze(&doc, AnalyzeOptions::default());
        assert!(!outcome.valid);
        assert!(outcome.issues.iter().any(|i| i.code == IssueCode::EmptyDefinitions));
    }

    #[test]
    fn undeclared_var_is_a_warning_not_invalidating() {
        let mut doc = Document::default();
        doc.definitions.insert("x".into(), def(DT::Number));
        doc.logic_tree = vec![Rule {
            id: "r1".into(),
            law_ref: None,
            logic_version: None,
            when: Some(json!({">": [{"var": "ghost"}, 1]})),
            then: Some(Action::default()),
            disabled: false,
        }];
        let outcome = analyze(&doc, AnalyzeOptions::default());
        assert!(outcome.valid);
        assert!(outcome.issues.iter().any(|i| i.code == IssueCode::UndeclaredVar && i.severity == Severity::Warning));
    }

    #[test]
    fn derived_cycle_between_two_fields_is_detected() {
        let mut doc = Document::default();
        doc.state_model = Some(StateModel {
            inputs: vec![],
            derived: indexmap::IndexMap::from([
                ("a".to_string(), DerivedField { eval: json!({"var": "b"}) }),
                ("b".to_string(), DerivedField { eval: json!({"var": "a"}) }),
            ]),
        });
        let outcome = analyze(&doc, AnalyzeOptions::default());
        assert!(outcome.issues.iter().any(|i| i.code == IssueCode::DerivedCycle));
    }

    #[test]
    fn derived_self_reference_is_not_a_cycle() {
        let mut doc = Document::default();
        doc.state_model = Some(StateModel {
            inputs: vec![],
            derived: indexmap::IndexMap::from([(
                "running_total".to_string(),
                DerivedField { eval: json!({"var": "running_total"}) },
            )]),
        });
        let outcome = analyze(&doc, AnalyzeOptions::default());
        assert!(!outcome.issues.iter().any(|i| i.code == IssueCode::DerivedCycle));
    }

    #[test]
    fn conflicting_writers_is_a_warning() {
        let mut doc = Document::default();
        doc.definitions.insert("shared".into(), def(DT::Number));
        doc.logic_tree = vec![
            Rule {
                id: "r1".into(),
                law_ref: None,
                logic_version: None,
                when: Some(json!(true)),
                then: Some(Action {
                    set: Some(indexmap::IndexMap::from([("shared".to_string(), json!(1))])),
                    ui_modify: None,
                    error_msg: None,
                }),
                disabled: false,
            },
            Rule {
                id: "r2".into(),
                law_ref: None,
                logic_version: None,
                when: Some(json!(true)),
                then: Some(Action {
                    set: Some(indexmap::IndexMap::from([("shared".to_string(), json!(2))])),
                    ui_modify: None,
                    error_msg: None,
                }),
                disabled: false,
            },
        ];
        let outcome = analyze(&doc, AnalyzeOptions::default());
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.code == IssueCode::FieldWrittenByMultipleRules && i.severity == Severity::Warning));
    }
}
