//! Kubernetes-style status conditions.
//!
//! Conditions are kept as a set keyed by `type`: there is at most one entry per
//! type, and updates replace the existing entry in place.

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type reported once the greeting has been computed and persisted.
pub const CONDITION_READY: &str = "Ready";

/// Condition status following Kubernetes conventions.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true.
    True,
    /// Condition is false.
    False,
    /// Condition status is unknown.
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A single status condition.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, unique within a status (e.g. Ready).
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown).
    pub status: ConditionStatus,

    /// Machine-readable reason in CamelCase.
    #[serde(default)]
    pub reason: String,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,

    /// Last time the condition changed status, RFC 3339.
    pub last_transition_time: String,

    /// Generation of the resource the condition was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a condition that transitioned at `now`.
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            observed_generation: None,
        }
    }

    /// Set the observed generation.
    pub fn with_observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }
}

/// Insert or replace the condition with the same type.
///
/// When the stored condition already has the same status, its transition time
/// is kept so that re-applying an unchanged condition is a no-op. Any further
/// entries of the same type are dropped, leaving exactly one.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    let Some(index) = conditions.iter().position(|c| c.type_ == condition.type_) else {
        conditions.push(condition);
        return;
    };

    let existing = &conditions[index];
    if existing.status == condition.status {
        condition
            .last_transition_time
            .clone_from(&existing.last_transition_time);
    }
    let type_ = condition.type_.clone();
    conditions[index] = condition;

    let mut position = 0;
    conditions.retain(|c| {
        let keep = position <= index || c.type_ != type_;
        position += 1;
        keep
    });
}

/// Find a condition by type.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Remove the condition with the given type. Returns whether one was removed.
pub fn remove_condition(conditions: &mut Vec<Condition>, type_: &str) -> bool {
    let before = conditions.len();
    conditions.retain(|c| c.type_ != type_);
    conditions.len() != before
}

/// Whether a condition with the given type exists and has status True.
pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_)
        .map(|c| c.status == ConditionStatus::True)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn set_condition_appends_new_type() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            Condition::new(CONDITION_READY, ConditionStatus::True, "Reconciled", "", at(0)),
        );
        set_condition(
            &mut conditions,
            Condition::new("Degraded", ConditionStatus::False, "Healthy", "", at(0)),
        );

        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].type_, CONDITION_READY);
        assert_eq!(conditions[1].type_, "Degraded");
    }

    #[test]
    fn set_condition_replaces_in_place_without_duplicates() {
        let mut conditions = vec![
            Condition::new(CONDITION_READY, ConditionStatus::Unknown, "Pending", "", at(0)),
            Condition::new("Degraded", ConditionStatus::False, "Healthy", "", at(0)),
        ];

        set_condition(
            &mut conditions,
            Condition::new(CONDITION_READY, ConditionStatus::True, "Reconciled", "done", at(60)),
        );

        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].status, ConditionStatus::True);
        assert_eq!(conditions[0].reason, "Reconciled");
        assert_eq!(conditions[0].last_transition_time, "1970-01-01T00:01:00Z");
    }

    #[test]
    fn set_condition_collapses_repeated_types() {
        let mut conditions = vec![
            Condition::new(CONDITION_READY, ConditionStatus::False, "Failed", "", at(0)),
            Condition::new("Degraded", ConditionStatus::False, "Healthy", "", at(0)),
            Condition::new(CONDITION_READY, ConditionStatus::Unknown, "Pending", "", at(0)),
        ];

        set_condition(
            &mut conditions,
            Condition::new(CONDITION_READY, ConditionStatus::True, "Reconciled", "", at(60)),
        );

        let types: Vec<_> = conditions.iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(types, vec![CONDITION_READY, "Degraded"]);
        assert_eq!(conditions[0].status, ConditionStatus::True);
    }

    #[test]
    fn unchanged_status_keeps_transition_time() {
        let mut conditions = vec![Condition::new(
            CONDITION_READY,
            ConditionStatus::True,
            "Reconciled",
            "first",
            at(0),
        )];

        set_condition(
            &mut conditions,
            Condition::new(CONDITION_READY, ConditionStatus::True, "Reconciled", "second", at(300)),
        );

        assert_eq!(conditions[0].last_transition_time, "1970-01-01T00:00:00Z");
        assert_eq!(conditions[0].message, "second");
    }

    #[test]
    fn remove_and_query_conditions() {
        let mut conditions = vec![Condition::new(
            CONDITION_READY,
            ConditionStatus::True,
            "Reconciled",
            "",
            at(0),
        )];

        assert!(is_condition_true(&conditions, CONDITION_READY));
        assert!(!is_condition_true(&conditions, "Degraded"));
        assert!(remove_condition(&mut conditions, CONDITION_READY));
        assert!(!remove_condition(&mut conditions, CONDITION_READY));
        assert!(find_condition(&conditions, CONDITION_READY).is_none());
    }

    #[test]
    fn condition_wire_format() {
        let condition =
            Condition::new(CONDITION_READY, ConditionStatus::True, "Reconciled", "ok", at(0))
                .with_observed_generation(Some(3));
        let json = serde_json::to_value(&condition).unwrap();

        assert_eq!(json["type"], "Ready");
        assert_eq!(json["status"], "True");
        assert_eq!(json["lastTransitionTime"], "1970-01-01T00:00:00Z");
        assert_eq!(json["observedGeneration"], 3);
    }
}
