//! Invocation grammar
//!
//! Decides whether a `Run` is expressible as a `BuildRun`. Every violation
//! is collected so the author sees all of their mistakes in one message:
//! 1. exactly one of `ref` / embedded `spec`
//! 2. `ref` points at a `shipwright.io/v1alpha1` `Build` and names it
//! 3. embedded spec declares the same kind and carries a sound `BuildSpec`
//! 4. no retries
//! 5. only allow-listed params
//! 6. non-negative timeout

use runbridge_api::{
    BuildSpec, Duration, EmbeddedSpec, Invocation, Param, ParamValue, TaskRef, BUILD_API_VERSION,
    BUILD_KIND,
};
use std::collections::HashSet;
use std::fmt;

/// Param overriding the source repository URL
pub const PARAM_SOURCE_URL: &str = "shp-source-url";
/// Param overriding the source revision
pub const PARAM_SOURCE_REVISION: &str = "shp-source-revision";
/// Param overriding the output image
pub const PARAM_OUTPUT_IMAGE: &str = "shp-output-image";

/// Allow-listed params that map onto execution overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideParam {
    /// `shp-source-url`
    SourceUrl,
    /// `shp-source-revision`
    SourceRevision,
    /// `shp-output-image`
    OutputImage,
}

impl OverrideParam {
    /// Every supported param, in the order they are reported
    pub const ALL: [Self; 3] = [Self::SourceUrl, Self::SourceRevision, Self::OutputImage];

    /// Wire name of the param
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SourceUrl => PARAM_SOURCE_URL,
            Self::SourceRevision => PARAM_SOURCE_REVISION,
            Self::OutputImage => PARAM_OUTPUT_IMAGE,
        }
    }

    /// Look a param up by wire name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// What an accepted invocation builds
#[derive(Debug, Clone, PartialEq)]
pub enum BuildTarget {
    /// An existing `Build`, by name
    Reference {
        /// Build name
        name: String,
    },
    /// An inline build definition
    Embedded(Box<BuildSpec>),
}

/// An invocation that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedInvocation {
    /// Build to run
    pub target: BuildTarget,
    /// Allow-listed params with their string values, in invocation order
    pub overrides: Vec<(OverrideParam, String)>,
    /// Timeout to propagate
    pub timeout: Option<Duration>,
}

/// One grammar violation and the fields it concerns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Human readable message
    pub message: String,
    /// Field paths, e.g. `spec.ref.name`
    pub paths: Vec<String>,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.paths.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.message, self.paths.join(", "))
        }
    }
}

/// All violations found in one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    fn push<I, S>(&mut self, message: impl Into<String>, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.violations.push(FieldViolation {
            message: message.into(),
            paths: paths.into_iter().map(Into::into).collect(),
        });
    }

    /// Whether no violation was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Recorded violations, in rule order
    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate an invocation against the accepted grammar
pub fn validate(invocation: &Invocation) -> Result<AcceptedInvocation, ValidationErrors> {
    let spec = &invocation.spec;
    let mut errors = ValidationErrors::default();

    let target = match (&spec.reference, &spec.embedded) {
        (Some(reference), None) => validate_reference(reference, &mut errors),
        (None, Some(embedded)) => validate_embedded(embedded, &mut errors),
        _ => {
            errors.push("exactly one of ref/spec required", ["spec.ref", "spec.spec"]);
            None
        }
    };

    if spec.retries != 0 {
        errors.push("retries are not supported", ["spec.retries"]);
    }

    let overrides = validate_params(&spec.params, &mut errors);

    if spec.timeout.is_some_and(|t| t.is_negative()) {
        errors.push("timeout must be non-negative", ["spec.timeout"]);
    }

    match target {
        Some(target) if errors.is_empty() => Ok(AcceptedInvocation {
            target,
            overrides,
            timeout: spec.timeout,
        }),
        _ => Err(errors),
    }
}

fn kind_message() -> String {
    format!("kind must be {BUILD_KIND}, apiVersion must be {BUILD_API_VERSION}")
}

fn is_build_kind(kind: &str, api_version: &str) -> bool {
    kind == BUILD_KIND && api_version == BUILD_API_VERSION
}

fn validate_reference(reference: &TaskRef, errors: &mut ValidationErrors) -> Option<BuildTarget> {
    let mut valid = true;

    if !is_build_kind(&reference.kind, &reference.api_version) {
        errors.push(kind_message(), ["spec.ref.kind", "spec.ref.apiVersion"]);
        valid = false;
    }
    if reference.name.trim().is_empty() {
        errors.push("build name is required", ["spec.ref.name"]);
        valid = false;
    }

    valid.then(|| BuildTarget::Reference {
        name: reference.name.clone(),
    })
}

fn validate_embedded(embedded: &EmbeddedSpec, errors: &mut ValidationErrors) -> Option<BuildTarget> {
    // A payload declared as some other kind follows a grammar we don't own.
    if !is_build_kind(&embedded.kind, &embedded.api_version) {
        errors.push(kind_message(), ["spec.spec.kind", "spec.spec.apiVersion"]);
        return None;
    }

    let parsed = match &embedded.payload {
        Some(payload) => BuildSpec::from_payload(payload).map_err(|e| e.to_string()),
        None => Err("payload is empty".to_string()),
    };

    match parsed {
        Ok(build_spec) => Some(BuildTarget::Embedded(Box::new(build_spec))),
        Err(detail) => {
            errors.push(
                format!("failed to deserialize embedded build spec: {detail}"),
                ["spec.spec.spec"],
            );
            None
        }
    }
}

fn unsupported_message(name: &str) -> String {
    let supported = OverrideParam::ALL
        .iter()
        .map(|p| format!("{:?}", p.name()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Unsupported value: {name}: supported values: {supported}")
}

fn validate_params(params: &[Param], errors: &mut ValidationErrors) -> Vec<(OverrideParam, String)> {
    let mut overrides = Vec::with_capacity(params.len());
    let mut seen = HashSet::new();
    let mut reported_unsupported = false;

    for (i, param) in params.iter().enumerate() {
        let Some(known) = OverrideParam::from_name(&param.name) else {
            if !reported_unsupported {
                errors.push(
                    unsupported_message(&param.name),
                    [format!("spec.params[{i}].name")],
                );
                reported_unsupported = true;
            }
            continue;
        };

        if !seen.insert(known) {
            errors.push(
                format!("duplicate param name: {}", param.name),
                [format!("spec.params[{i}].name")],
            );
            continue;
        }

        match &param.value {
            ParamValue::String(value) => overrides.push((known, value.clone())),
            ParamValue::Array(_) => errors.push(
                format!("expected string value for param {}", param.name),
                [format!("spec.params[{i}].value")],
            ),
        }
    }

    overrides
}

#[cfg(test)]
mod tests;
