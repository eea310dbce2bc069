//! Runbridge API - Object model
//!
//! Wire types shared by the adapter and its collaborators:
//! - Invocation: the orchestrator's custom task `Run`
//! - Execution: the native `BuildRun` request and its status
//! - Build: the build definition grammar (`Build` / `BuildSpec`)
//! - Condition, metadata and Go-style durations

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod build;
pub mod condition;
pub mod duration;
pub mod error;
pub mod execution;
pub mod invocation;
pub mod meta;

pub use build::{
    Build, BuildSpec, Image, Source, Strategy, StrategyKind, BUILD_API_VERSION, BUILD_KIND,
};
pub use condition::{
    find_condition, set_condition, Condition, ConditionStatus, CONDITION_SUCCEEDED,
};
pub use duration::Duration;
pub use error::{Error, Result};
pub use execution::{
    BuildReference, ExecutionBuild, ExecutionOverrides, ExecutionPhase, ExecutionRequest,
    ExecutionSpec, ExecutionStatus, BUILD_RUN_KIND,
};
pub use invocation::{
    EmbeddedSpec, Invocation, InvocationSpec, InvocationStatus, Param, ParamValue, TaskRef,
    RUN_API_VERSION, RUN_KIND,
};
pub use meta::{ObjectKey, ObjectMeta, OwnerReference};
