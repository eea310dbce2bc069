//! Manifest loading
//!
//! Reads `Run`, `Build` and `BuildRun` objects from YAML or JSON files
//! (several documents per file allowed) and seeds them into the store.

use anyhow::{bail, Context, Result};
use runbridge_api::{Build, ExecutionRequest, Invocation, BUILD_KIND, BUILD_RUN_KIND, RUN_KIND};
use runbridge_core::InMemoryStore;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One object read from a manifest
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    /// Orchestrator invocation
    Run(Invocation),
    /// Build definition
    Build(Build),
    /// Native execution request
    BuildRun(ExecutionRequest),
}

/// Counts of seeded objects
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub runs: usize,
    pub builds: usize,
    pub build_runs: usize,
}

/// Parse every document in `content`
pub fn parse_manifests(content: &str) -> Result<Vec<Manifest>> {
    let mut manifests = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .with_context(|| format!("document {index} is not valid YAML"))?;
        if value.is_null() {
            continue;
        }

        let kind = value
            .get("kind")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let manifest = match kind.as_str() {
            RUN_KIND => Manifest::Run(
                serde_yaml::from_value(value).with_context(|| format!("document {index}: invalid Run"))?,
            ),
            BUILD_KIND => Manifest::Build(
                serde_yaml::from_value(value)
                    .with_context(|| format!("document {index}: invalid Build"))?,
            ),
            BUILD_RUN_KIND => Manifest::BuildRun(
                serde_yaml::from_value(value)
                    .with_context(|| format!("document {index}: invalid BuildRun"))?,
            ),
            other => bail!("document {index}: unsupported kind {other:?}"),
        };
        manifests.push(manifest);
    }

    Ok(manifests)
}

/// Parse one manifest file
pub fn read_manifest_file(path: &Path) -> Result<Vec<Manifest>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_manifests(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse every `.yaml`, `.yml` and `.json` file in `dir`, in file name order
pub fn load_manifests(dir: &Path) -> Result<Vec<Manifest>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read manifest directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml" | "yml" | "json")
            )
        })
        .collect();
    files.sort();

    let mut manifests = Vec::new();
    for file in files {
        let parsed = read_manifest_file(&file)?;
        debug!(file = %file.display(), objects = parsed.len(), "Loaded manifest");
        manifests.extend(parsed);
    }
    Ok(manifests)
}

/// Apply manifests to the store: builds first, then executions, then runs
pub async fn seed(store: &InMemoryStore, manifests: Vec<Manifest>) -> SeedSummary {
    let mut summary = SeedSummary::default();
    let mut runs = Vec::new();
    let mut build_runs = Vec::new();

    for manifest in manifests {
        match manifest {
            Manifest::Build(build) => {
                store.apply_build(build).await;
                summary.builds += 1;
            }
            Manifest::BuildRun(execution) => build_runs.push(execution),
            Manifest::Run(run) => runs.push(run),
        }
    }
    for execution in build_runs {
        store.apply_execution(execution).await;
        summary.build_runs += 1;
    }
    for run in runs {
        store.apply_invocation(run).await;
        summary.runs += 1;
    }

    info!(
        runs = summary.runs,
        builds = summary.builds,
        build_runs = summary.build_runs,
        "Seeded store from manifests"
    );
    summary
}
