//! Native execution requests (`BuildRun`)
//!
//! Created by the adapter from an accepted invocation, executed by the
//! build engine, which writes the status block.

use crate::build::{BuildSpec, BUILD_API_VERSION};
use crate::condition::{find_condition, Condition, ConditionStatus, CONDITION_SUCCEEDED};
use crate::duration::Duration;
use crate::meta::{ObjectKey, ObjectMeta};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind name of a native execution request
pub const BUILD_RUN_KIND: &str = "BuildRun";

fn default_api_version() -> String {
    BUILD_API_VERSION.to_string()
}

fn default_kind() -> String {
    BUILD_RUN_KIND.to_string()
}

/// A native execution request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Requested execution
    pub spec: ExecutionSpec,
    /// Written by the build engine
    #[serde(default, skip_serializing_if = "ExecutionStatus::is_empty")]
    pub status: ExecutionStatus,
}

impl ExecutionRequest {
    /// Create a request with the given metadata and spec
    pub fn new(metadata: ObjectMeta, spec: ExecutionSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata,
            spec,
            status: ExecutionStatus::default(),
        }
    }

    /// Key identifying this request
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }
}

/// Execution spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSpec {
    /// Build to run
    #[serde(flatten)]
    pub build: ExecutionBuild,
    /// Overrides applied on top of the build definition
    #[serde(default, skip_serializing_if = "ExecutionOverrides::is_empty")]
    pub overrides: ExecutionOverrides,
    /// Overall timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

/// Either a named build or an inline build definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionBuild {
    /// Run an existing build
    BuildRef(BuildReference),
    /// Run an inline build definition
    BuildSpec(Box<BuildSpec>),
}

/// Reference to an existing build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReference {
    /// Build name, in the request's namespace
    pub name: String,
    /// Build API version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

/// Values taken from allow-listed invocation params
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOverrides {
    /// Source repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Source revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_revision: Option<String>,
    /// Output image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_image: Option<String>,
}

impl ExecutionOverrides {
    /// Whether no override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_url.is_none() && self.source_revision.is_none() && self.output_image.is_none()
    }
}

/// Coarse execution state derived from the `Succeeded` condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    /// Engine has not reported progress yet
    Pending,
    /// Running
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished unsuccessfully
    Failed,
}

/// Execution status, written by the build engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatus {
    /// Ordered conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Terminal result values (digest, size, commit sha)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub results: BTreeMap<String, String>,
    /// Start time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Completion time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
}

impl ExecutionStatus {
    /// Whether the engine has written nothing yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
            && self.results.is_empty()
            && self.start_time.is_none()
            && self.completion_time.is_none()
    }

    /// Whether the engine has started working on the request
    #[must_use]
    pub fn has_started(&self) -> bool {
        !self.conditions.is_empty() || self.start_time.is_some()
    }

    /// The `Succeeded` condition, if set
    #[must_use]
    pub fn succeeded(&self) -> Option<&Condition> {
        find_condition(&self.conditions, CONDITION_SUCCEEDED)
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> ExecutionPhase {
        match self.succeeded().map(|c| c.status) {
            None => ExecutionPhase::Pending,
            Some(ConditionStatus::Unknown) => ExecutionPhase::Running,
            Some(ConditionStatus::True) => ExecutionPhase::Succeeded,
            Some(ConditionStatus::False) => ExecutionPhase::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(build: ExecutionBuild) -> ExecutionRequest {
        ExecutionRequest::new(
            ObjectMeta::new("build-pipeline", "image-build"),
            ExecutionSpec {
                build,
                overrides: ExecutionOverrides::default(),
                timeout: None,
            },
        )
    }

    #[test]
    fn test_build_ref_wire_format() {
        let req = request(ExecutionBuild::BuildRef(BuildReference {
            name: "image-build".to_string(),
            api_version: None,
        }));

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["kind"], "BuildRun");
        assert_eq!(json["spec"]["buildRef"]["name"], "image-build");
        assert!(json["spec"].get("buildSpec").is_none());
        assert!(json["spec"].get("overrides").is_none());
        assert!(json.get("status").is_none());

        let parsed: ExecutionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn test_parse_with_status() {
        let req: ExecutionRequest = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "image-build", "namespace": "build-pipeline"},
            "spec": {
                "buildRef": {"name": "image-build"},
                "overrides": {"outputImage": "registry.example.com/app:latest"},
                "timeout": "10m"
            },
            "status": {
                "conditions": [{"type": "Succeeded", "status": "Unknown", "reason": "Running"}]
            }
        }))
        .unwrap();

        assert_eq!(
            req.spec.overrides.output_image.as_deref(),
            Some("registry.example.com/app:latest")
        );
        assert_eq!(req.spec.timeout, Some(Duration::from_mins(10)));
        assert_eq!(req.status.phase(), ExecutionPhase::Running);
        assert!(req.status.has_started());
    }

    #[test]
    fn test_phase_mapping() {
        let mut status = ExecutionStatus::default();
        assert_eq!(status.phase(), ExecutionPhase::Pending);
        assert!(!status.has_started());

        status
            .conditions
            .push(Condition::succeeded(ConditionStatus::True, "Succeeded", ""));
        assert_eq!(status.phase(), ExecutionPhase::Succeeded);

        status.conditions[0].status = ConditionStatus::False;
        assert_eq!(status.phase(), ExecutionPhase::Failed);
    }
}
