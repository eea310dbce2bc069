//! Status mirror
//!
//! Maps the native execution status onto the invocation status:
//!
//! | Execution | Invocation `Succeeded` |
//! | --- | --- |
//! | absent / no condition | `Unknown`, `AwaitingExecution` |
//! | `Unknown` | `Unknown`, `Running` |
//! | `True` | `True`, `Succeeded`, results copied |
//! | `False` | `False`, native reason and message |
//!
//! Mirroring is monotonic: a terminal invocation is never patched again.

use chrono::{DateTime, Utc};
use runbridge_api::{
    set_condition, Condition, ConditionStatus, ExecutionPhase, ExecutionStatus, InvocationStatus,
};
use std::collections::BTreeMap;

/// Condition reasons written by the adapter
pub mod reasons {
    /// Execution requested, not yet picked up by the build engine
    pub const AWAITING_EXECUTION: &str = "AwaitingExecution";
    /// Execution running
    pub const RUNNING: &str = "Running";
    /// Execution succeeded
    pub const SUCCEEDED: &str = "Succeeded";
    /// Execution failed without a reason of its own
    pub const FAILED: &str = "Failed";
    /// Invocation rejected by the grammar validator
    pub const VALIDATION_FAILED: &str = "ValidationFailed";
    /// Referenced build never appeared
    pub const BUILD_NOT_FOUND: &str = "BuildNotFound";
    /// Execution name taken by an object the invocation does not own
    pub const EXECUTION_CONFLICT: &str = "ExecutionConflict";
}

const AWAITING_MESSAGE: &str = "waiting for the build engine to start the execution";

/// Change to apply to an invocation status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPatch {
    /// Desired `Succeeded` condition
    pub condition: Condition,
    /// Result values to copy, empty unless the execution succeeded
    pub results: BTreeMap<String, String>,
    /// Whether an execution was observed
    pub observed: bool,
    /// Execution start time as reported by the engine
    pub start_time: Option<DateTime<Utc>>,
    /// Execution completion time as reported by the engine
    pub completion_time: Option<DateTime<Utc>>,
}

impl StatusPatch {
    fn from_condition(condition: Condition) -> Self {
        Self {
            condition,
            results: BTreeMap::new(),
            observed: false,
            start_time: None,
            completion_time: None,
        }
    }

    /// Terminal failure decided by the adapter itself
    pub fn rejected(reason: &str, message: impl Into<String>) -> Self {
        Self::from_condition(Condition::succeeded(
            ConditionStatus::False,
            reason,
            message,
        ))
    }

    /// Non-terminal state while no execution is running yet
    pub fn awaiting(message: impl Into<String>) -> Self {
        Self::from_condition(Condition::succeeded(
            ConditionStatus::Unknown,
            reasons::AWAITING_EXECUTION,
            message,
        ))
    }

    /// Whether the patch ends the invocation
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.condition.is_terminal()
    }

    /// Apply to `status`, returning whether anything changed.
    ///
    /// `startTime` and `completionTime` are set once and never moved.
    pub fn apply(&self, status: &mut InvocationStatus, now: DateTime<Utc>) -> bool {
        let mut changed = set_condition(&mut status.conditions, self.condition.clone(), now);

        if self.observed && status.start_time.is_none() {
            status.start_time = Some(self.start_time.unwrap_or(now));
            changed = true;
        }
        if self.is_terminal() && status.completion_time.is_none() {
            status.completion_time = Some(self.completion_time.unwrap_or(now));
            changed = true;
        }
        if !self.results.is_empty() && status.results != self.results {
            status.results = self.results.clone();
            changed = true;
        }

        changed
    }
}

/// Compute the patch that brings `invocation` in line with `execution`.
///
/// `None` once the invocation is terminal.
#[must_use]
pub fn mirror(
    invocation: &InvocationStatus,
    execution: Option<&ExecutionStatus>,
) -> Option<StatusPatch> {
    if invocation.is_terminal() {
        return None;
    }

    let Some(execution) = execution else {
        return Some(StatusPatch::awaiting(AWAITING_MESSAGE));
    };

    let native = execution.succeeded();
    let message = native.map(|c| c.message.clone()).unwrap_or_default();

    let (condition, results) = match execution.phase() {
        ExecutionPhase::Pending => (
            Condition::succeeded(
                ConditionStatus::Unknown,
                reasons::AWAITING_EXECUTION,
                AWAITING_MESSAGE,
            ),
            BTreeMap::new(),
        ),
        ExecutionPhase::Running => (
            Condition::succeeded(ConditionStatus::Unknown, reasons::RUNNING, message),
            BTreeMap::new(),
        ),
        ExecutionPhase::Succeeded => (
            Condition::succeeded(ConditionStatus::True, reasons::SUCCEEDED, message),
            execution.results.clone(),
        ),
        ExecutionPhase::Failed => {
            let reason = native
                .map(|c| c.reason.as_str())
                .filter(|r| !r.is_empty())
                .unwrap_or(reasons::FAILED);
            (
                Condition::succeeded(ConditionStatus::False, reason, message),
                BTreeMap::new(),
            )
        }
    };

    Some(StatusPatch {
        condition,
        results,
        observed: execution.has_started(),
        start_time: execution.start_time,
        completion_time: execution.completion_time,
    })
}
