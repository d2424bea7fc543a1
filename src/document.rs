//! The document model: definitions, rules, derived fields, temporal
//! branches, attestations, and the output-populated errors/status.
//!
//! Every entity derives `Serialize`/`Deserialize` with `#[serde(default)]`
//! on optional and boolean-default fields, since a caller rarely repeats
//! every optional key in a hand-authored document.

use crate::error::EngineError;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Root container consumed by `analyze` and produced/consumed by
/// `evaluate`/`verify`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,

    #[serde(default)]
    pub definitions: IndexMap<String, Definition>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attestations: IndexMap<String, Attestation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logic_tree: Vec<Rule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temporal_map: Vec<TemporalBranch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_model: Option<StateModel>,

    /// Output-populated: accumulated validation errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationError>,

    /// Output-populated: overall document status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    /// Unknown top-level fields, preserved across `evaluate`/`verify`
    /// per §6.1's "preserved on the way out" implementation choice.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Document {
    /// Parses a document from its JSON wire form, reporting malformed
    /// input as an [`EngineError::Malformed`] rather than a raw serde error.
    pub fn parse(source: &str) -> Result<Self, EngineError> {
        serde_json::from_str(source).map_err(|e| EngineError::Malformed(e.to_string()))
    }
}

/// The declared type of a [`Definition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefType {
    String,
    Number,
    Boolean,
    Select,
    Date,
    Attestation,
    Currency,
}

impl DefType {
    /// Returns `true` if this type accepts numeric constraints
    /// (`min`/`max`/`step`) natively.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DefType::Number | DefType::Currency)
    }

    /// Returns `true` if this type accepts string constraints
    /// (`min_length`/`max_length`/`pattern`) natively.
    pub fn is_stringy(&self) -> bool {
        matches!(self, DefType::String | DefType::Select)
    }
}

/// A typed named field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    #[serde(rename = "type")]
    pub def_type: DefType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_message: Option<String>,

    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub readonly: bool,
    /// `None` means "unset"; `evaluate`'s materialize step defaults it
    /// to `true` and distinguishing unset from explicit is needed to
    /// implement that step faithfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Definition {
    /// Returns whether `visible` is effectively true, defaulting unset
    /// to `true` per the materialize step.
    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(true)
    }
}

/// A when-then clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub law_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<Action>,
    #[serde(default)]
    pub disabled: bool,
}

/// A bundle of value assignments, UI/constraint mutations, and an
/// optional error message.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<IndexMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_modify: Option<IndexMap<String, IndexMap<String, Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

/// A dated interval paired with a logic-version label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalBranch {
    pub valid_range: ValidRange,
    pub logic_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// `[startDate, endDate?]`; `end` may be open-ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidRange {
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// `{ inputs, derived }`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateModel {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub derived: IndexMap<String, DerivedField>,
}

/// A named pure expression treated as a computed field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedField {
    pub eval: Value,
}

/// A signed affirmation gating completion.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Attestation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub law_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub signed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_sign: Option<Action>,
}

/// Evidence supplied by an attestation signature.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Evidence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_audit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic_version: Option<String>,
}

/// A single accumulated validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub kind: ValidationErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub law_ref: Option<String>,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            field_id: None,
            rule_id: None,
            kind,
            message: message.into(),
            law_ref: None,
        }
    }

    pub fn with_field(mut self, field_id: impl Into<String>) -> Self {
        self.field_id = Some(field_id.into());
        self
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_law_ref(mut self, law_ref: Option<String>) -> Self {
        self.law_ref = law_ref;
        self
    }
}

/// The six validation-error tags from §7, each influencing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    TypeMismatch,
    MissingRequired,
    ConstraintViolation,
    AttestationIncomplete,
    RuntimeWarning,
    CycleDetected,
    /// Not named in §7's six-kind taxonomy proper: records the panic-safe
    /// internal-failure path from §4.4/§7 as a first-class (rather than
    /// out-of-band) error so `evaluate` never needs to return `Result`.
    Internal,
}

/// The overall document status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ready,
    Incomplete,
    Invalid,
}
