//! Status conditions
//!
//! Both the invocation and the native execution report progress through a
//! single `Succeeded` condition whose status is `Unknown` while work is in
//! flight and `True`/`False` once it is over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition type carried by both object kinds
pub const CONDITION_SUCCEEDED: &str = "Succeeded";

/// Tri-state condition status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
    /// Not yet decided
    Unknown,
}

impl ConditionStatus {
    /// Returns the string representation of the status
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observed condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,
    /// Condition status
    pub status: ConditionStatus,
    /// Stable, machine-readable reason token
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Free-text message for humans
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Last time `status` changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// Create a `Succeeded` condition
    pub fn succeeded(
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: CONDITION_SUCCEEDED.to_string(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: None,
        }
    }

    /// Whether the condition is `True` or `False`
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status != ConditionStatus::Unknown
    }

    /// Whether two conditions carry the same observable state, ignoring time
    #[must_use]
    pub fn same_state(&self, other: &Self) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Find a condition by type
#[must_use]
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Insert or replace the condition of the same type.
///
/// `last_transition_time` is set to `now` when the status changes and kept
/// otherwise. Returns `false` when nothing observable changed.
pub fn set_condition(conditions: &mut Vec<Condition>, mut next: Condition, now: DateTime<Utc>) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == next.type_) {
        Some(current) => {
            if current.same_state(&next) {
                return false;
            }
            next.last_transition_time = if current.status == next.status {
                current.last_transition_time
            } else {
                Some(now)
            };
            *current = next;
            true
        }
        None => {
            next.last_transition_time = Some(now);
            conditions.push(next);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_set_condition_inserts() {
        let mut conditions = Vec::new();
        let changed = set_condition(
            &mut conditions,
            Condition::succeeded(ConditionStatus::Unknown, "Running", ""),
            at(10),
        );

        assert!(changed);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].last_transition_time, Some(at(10)));
    }

    #[test]
    fn test_set_condition_same_state_is_noop() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            Condition::succeeded(ConditionStatus::Unknown, "Running", ""),
            at(10),
        );
        let changed = set_condition(
            &mut conditions,
            Condition::succeeded(ConditionStatus::Unknown, "Running", ""),
            at(20),
        );

        assert!(!changed);
        assert_eq!(conditions[0].last_transition_time, Some(at(10)));
    }

    #[test]
    fn test_transition_time_moves_only_on_status_change() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            Condition::succeeded(ConditionStatus::Unknown, "AwaitingExecution", ""),
            at(10),
        );
        set_condition(
            &mut conditions,
            Condition::succeeded(ConditionStatus::Unknown, "Running", ""),
            at(20),
        );
        assert_eq!(conditions[0].reason, "Running");
        assert_eq!(conditions[0].last_transition_time, Some(at(10)));

        set_condition(
            &mut conditions,
            Condition::succeeded(ConditionStatus::True, "Succeeded", ""),
            at(30),
        );
        assert_eq!(conditions[0].last_transition_time, Some(at(30)));
        assert!(conditions[0].is_terminal());
    }

    #[test]
    fn test_condition_wire_format() {
        let condition = Condition::succeeded(ConditionStatus::False, "Failed", "boom");
        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(json["type"], "Succeeded");
        assert_eq!(json["status"], "False");
        assert_eq!(json["reason"], "Failed");
        assert_eq!(json["message"], "boom");
    }
}
