//! The temporal router (§4.3): selects the active logic version for a
//! given effective instant and disables rules tied to a different
//! version.

use crate::document::{Rule, TemporalBranch, ValidationError, ValidationErrorKind};
use crate::value::as_date;
use chrono::{DateTime, Utc};

/// Validates the temporal map and disables every rule whose
/// `logic_version` doesn't match the selected branch. Returns the
/// accumulated validation errors (overlap/zero-length/empty-version
/// findings); mutates `rules` in place by setting `disabled`.
///
/// Branches with unparseable dates are skipped for selection purposes
/// but still checked structurally.
pub fn route(
    branches: &[TemporalBranch],
    rules: &mut [Rule],
    effective_instant: DateTime<Utc>,
) -> Vec<ValidationError> {
    let mut errors = validate_branches(branches);

    let selected = select_branch(branches, effective_instant);

    if let Some(version) = selected {
        for rule in rules.iter_mut() {
            match &rule.logic_version {
                Some(v) if v != version => rule.disabled = true,
                _ => {}
            }
        }
    }

    errors
}

/// Picks the first branch whose range covers `instant`, start-inclusive
/// and end-inclusive-or-open.
fn select_branch(branches: &[TemporalBranch], instant: DateTime<Utc>) -> Option<&str> {
    for branch in branches {
        let Some(start) = as_date(&serde_json::Value::String(branch.valid_range.start.clone()))
        else {
            continue;
        };
        let end = branch
            .valid_range
            .end
            .as_ref()
            .and_then(|e| as_date(&serde_json::Value::String(e.clone())));

        let covers = instant >= start && end.map(|e| instant <= e).unwrap_or(true);
        if covers {
            return Some(branch.logic_version.as_str());
        }
    }
    None
}

/// Branches with `start == end`, overlapping a previous branch's range,
/// or an empty `logic_version` are all recorded as `runtime_warning`
/// findings: they surface in `errors` but never abort evaluation and
/// never push `determine_status` past `ready` on their own.
fn validate_branches(branches: &[TemporalBranch]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen: Vec<(DateTime<Utc>, Option<DateTime<Utc>>)> = Vec::new();

    for branch in branches {
        if branch.logic_version.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::RuntimeWarning,
                "temporal branch has an empty logic_version",
            ));
        }

        let start = as_date(&serde_json::Value::String(branch.valid_range.start.clone()));
        let end = branch
            .valid_range
            .end
            .as_ref()
            .and_then(|e| as_date(&serde_json::Value::String(e.clone())));

        if let (Some(s), Some(e)) = (start, end) {
            if s == e {
                errors.push(ValidationError::new(
                    ValidationErrorKind::RuntimeWarning,
                    format!(
                        "temporal branch '{}' has a zero-length range",
                        branch.logic_version
                    ),
                ));
            }
        }

        if let Some(s) = start {
            let overlaps_previous = seen.iter().any(|(prev_start, prev_end)| {
                s >= *prev_start && prev_end.map(|e| s <= e).unwrap_or(true)
            });
            if overlaps_previous {
                errors.push(ValidationError::new(
                    ValidationErrorKind::RuntimeWarning,
                    format!(
                        "temporal branch '{}' overlaps a previous branch's range",
                        branch.logic_version
                    ),
                ));
            }
            seen.push((s, end));
        }
    }

    errors
}
