//! Build definitions
//!
//! A `Build` names the strategy, source and output image for one image
//! build. The adapter only reads builds: it checks that a referenced build
//! exists and that an embedded `BuildSpec` payload is structurally sound.

use crate::duration::Duration;
use crate::error::{Error, Result};
use crate::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use url::Url;

/// API version of the native build kinds
pub const BUILD_API_VERSION: &str = "shipwright.io/v1alpha1";

/// Kind name of a build definition
pub const BUILD_KIND: &str = "Build";

fn default_api_version() -> String {
    BUILD_API_VERSION.to_string()
}

fn default_kind() -> String {
    BUILD_KIND.to_string()
}

/// A stored build definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Build definition
    pub spec: BuildSpec,
}

impl Build {
    /// Create a build with the given identity
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: BuildSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta::new(namespace, name),
            spec,
        }
    }
}

/// Strategy, source and output triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    /// Where the sources come from
    pub source: Source,
    /// Which build strategy runs
    pub strategy: Strategy,
    /// Where the image goes
    pub output: Image,
    /// Build-level timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

/// Source location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Branch, tag or commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Sub-directory holding the build context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,
}

/// Kind of strategy object a build refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Namespaced strategy
    BuildStrategy,
    /// Cluster-wide strategy
    ClusterBuildStrategy,
}

/// Strategy reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    /// Strategy kind; namespaced when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StrategyKind>,
    /// Strategy name
    #[serde(default)]
    pub name: String,
}

/// Output image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Image reference the build pushes to
    #[serde(default)]
    pub image: String,
}

impl BuildSpec {
    /// Deserialize an embedded payload and check its structure.
    ///
    /// Both failure modes come back as [`Error::Deserialize`]; callers report
    /// them through one generic message.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self> {
        let spec: Self = serde_json::from_value(payload.clone())
            .map_err(|e| Error::Deserialize(e.to_string()))?;
        spec.validate()
            .map_err(|e| Error::Deserialize(e.to_string()))?;
        Ok(spec)
    }

    /// Check the structural grammar of the build definition
    pub fn validate(&self) -> Result<()> {
        let url = self
            .source
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| invalid("source.url", "source URL is required"))?;
        Url::parse(url).map_err(|e| invalid("source.url", &format!("invalid URL {url:?}: {e}")))?;

        if let Some(revision) = &self.source.revision {
            if revision.trim().is_empty() {
                return Err(invalid("source.revision", "revision must not be empty"));
            }
        }

        if self.strategy.name.trim().is_empty() {
            return Err(invalid("strategy.name", "strategy name is required"));
        }

        let image = self.output.image.trim();
        if image.is_empty() {
            return Err(invalid("output.image", "output image is required"));
        }
        if image.chars().any(char::is_whitespace) {
            return Err(invalid(
                "output.image",
                &format!("invalid image reference {image:?}"),
            ));
        }

        if self.timeout.is_some_and(|t| t.is_negative()) {
            return Err(invalid("timeout", "timeout must be non-negative"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> Error {
    Error::InvalidBuildSpec {
        field: field.to_string(),
        message: message.to_string(),
    }
}
