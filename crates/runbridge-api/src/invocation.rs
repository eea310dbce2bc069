//! Invocations
//!
//! The orchestrator's custom task object (`Run`). The schema is shared with
//! unmodified orchestrators: `ref` and the embedded `spec` are two optional
//! fields, and the validator enforces that exactly one is set.

use crate::condition::{find_condition, Condition, CONDITION_SUCCEEDED};
use crate::duration::Duration;
use crate::meta::{ObjectKey, ObjectMeta};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API version of the invocation kind
pub const RUN_API_VERSION: &str = "tekton.dev/v1alpha1";

/// Kind name of an invocation
pub const RUN_KIND: &str = "Run";

fn default_api_version() -> String {
    RUN_API_VERSION.to_string()
}

fn default_kind() -> String {
    RUN_KIND.to_string()
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

/// A custom task invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Desired state, written by the orchestrator
    #[serde(default)]
    pub spec: InvocationSpec,
    /// Observed state, written by the adapter
    #[serde(default)]
    pub status: InvocationStatus,
}

impl Invocation {
    /// Create an invocation with the given identity and spec
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: InvocationSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: InvocationStatus::default(),
        }
    }

    /// Key identifying this invocation
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }
}

/// Invocation spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationSpec {
    /// Reference to an existing build definition
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<TaskRef>,
    /// Inline build definition
    #[serde(rename = "spec", default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<EmbeddedSpec>,
    /// Ordered parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    /// Overall timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Requested retry count
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: i32,
}

impl InvocationSpec {
    /// Spec referencing a build by name
    pub fn for_build(name: impl Into<String>) -> Self {
        Self {
            reference: Some(TaskRef::build(name)),
            ..Default::default()
        }
    }

    /// Add a string parameter
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(Param::string(name, value));
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Pointer to a pre-existing build definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    /// Referenced kind
    #[serde(default)]
    pub kind: String,
    /// Referenced API version
    #[serde(default)]
    pub api_version: String,
    /// Referenced object name
    #[serde(default)]
    pub name: String,
}

impl TaskRef {
    /// Reference to a native build
    pub fn build(name: impl Into<String>) -> Self {
        Self {
            kind: crate::build::BUILD_KIND.to_string(),
            api_version: crate::build::BUILD_API_VERSION.to_string(),
            name: name.into(),
        }
    }
}

/// Inline, serialized build definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedSpec {
    /// Declared kind
    #[serde(default)]
    pub kind: String,
    /// Declared API version
    #[serde(default)]
    pub api_version: String,
    /// Raw build definition
    #[serde(rename = "spec", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Named parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Parameter value
    pub value: ParamValue,
}

impl Param {
    /// Create a string parameter
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::String(value.into()),
        }
    }
}

/// Parameter value: a string or an array of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Scalar value
    String(String),
    /// Array value
    Array(Vec<String>),
}

impl ParamValue {
    /// The scalar value, if this is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Array(_) => None,
        }
    }
}

/// Invocation status, mirrored from the native execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationStatus {
    /// Ordered conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Named result values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub results: BTreeMap<String, String>,
    /// Generation the status was computed from
    #[serde(default)]
    pub observed_generation: i64,
    /// When the execution was first observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// When the invocation reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
}

impl InvocationStatus {
    /// The `Succeeded` condition, if set
    #[must_use]
    pub fn succeeded(&self) -> Option<&Condition> {
        find_condition(&self.conditions, CONDITION_SUCCEEDED)
    }

    /// Whether the invocation has reached `Succeeded=True` or `Succeeded=False`
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.succeeded().is_some_and(Condition::is_terminal)
    }
}
