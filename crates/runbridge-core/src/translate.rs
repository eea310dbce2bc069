//! Invocation to execution request
//!
//! Pure and deterministic: the same invocation always yields the same
//! request, down to the serialized bytes.

use crate::validation::{AcceptedInvocation, BuildTarget, OverrideParam};
use runbridge_api::{
    BuildReference, ExecutionBuild, ExecutionOverrides, ExecutionRequest, ExecutionSpec,
    Invocation, ObjectKey, ObjectMeta, OwnerReference, BUILD_API_VERSION,
};

/// Label carrying the owning invocation's name
pub const LABEL_RUN: &str = "runbridge.io/run";
/// Label carrying the owning invocation's uid
pub const LABEL_RUN_UID: &str = "runbridge.io/run-uid";

/// Key of the execution derived from an invocation
#[must_use]
pub fn execution_key(invocation: &Invocation) -> ObjectKey {
    invocation.key()
}

/// Build the execution request for an accepted invocation
#[must_use]
pub fn translate(invocation: &Invocation, accepted: &AcceptedInvocation) -> ExecutionRequest {
    let mut metadata = ObjectMeta::new(
        invocation.metadata.namespace.clone(),
        invocation.metadata.name.clone(),
    );
    metadata
        .labels
        .insert(LABEL_RUN.to_string(), invocation.metadata.name.clone());
    metadata
        .labels
        .insert(LABEL_RUN_UID.to_string(), invocation.metadata.uid.clone());
    metadata.owner_references.push(OwnerReference {
        api_version: invocation.api_version.clone(),
        kind: invocation.kind.clone(),
        name: invocation.metadata.name.clone(),
        uid: invocation.metadata.uid.clone(),
        controller: true,
        block_owner_deletion: true,
    });

    let build = match &accepted.target {
        BuildTarget::Reference { name } => ExecutionBuild::BuildRef(BuildReference {
            name: name.clone(),
            api_version: Some(BUILD_API_VERSION.to_string()),
        }),
        BuildTarget::Embedded(spec) => ExecutionBuild::BuildSpec(spec.clone()),
    };

    let mut overrides = ExecutionOverrides::default();
    for (param, value) in &accepted.overrides {
        let slot = match param {
            OverrideParam::SourceUrl => &mut overrides.source_url,
            OverrideParam::SourceRevision => &mut overrides.source_revision,
            OverrideParam::OutputImage => &mut overrides.output_image,
        };
        *slot = Some(value.clone());
    }

    ExecutionRequest::new(
        metadata,
        ExecutionSpec {
            build,
            overrides,
            timeout: accepted.timeout,
        },
    )
}
