//! Offline manifest commands

use crate::server::manifests::{read_manifest_file, Manifest};
use anyhow::{bail, Context, Result};
use runbridge_api::{ExecutionRequest, Invocation};
use runbridge_core::{translate, validate, ValidationErrors};
use std::path::Path;

/// Outcome of checking one `Run`
#[derive(Debug)]
pub struct Checked {
    pub name: String,
    pub outcome: std::result::Result<ExecutionRequest, ValidationErrors>,
}

/// Validate and translate every `Run` in `manifests`; other kinds are skipped
pub fn check(manifests: Vec<Manifest>) -> Vec<Checked> {
    manifests
        .into_iter()
        .filter_map(|manifest| match manifest {
            Manifest::Run(run) => Some(check_run(&run)),
            Manifest::Build(_) | Manifest::BuildRun(_) => None,
        })
        .collect()
}

fn check_run(run: &Invocation) -> Checked {
    Checked {
        name: run.key().to_string(),
        outcome: validate(run).map(|accepted| translate(run, &accepted)),
    }
}

fn load_runs(path: &Path) -> Result<Vec<Checked>> {
    let checked = check(read_manifest_file(path)?);
    if checked.is_empty() {
        bail!("{} contains no Run manifests", path.display());
    }
    Ok(checked)
}

/// `runbridge validate`
pub fn validate_file(path: &Path) -> Result<()> {
    let mut rejected = 0;
    for run in load_runs(path)? {
        match run.outcome {
            Ok(_) => println!("✅ {}: accepted", run.name),
            Err(errors) => {
                rejected += 1;
                println!("❌ {}: rejected", run.name);
                for violation in errors.violations() {
                    println!("   - {violation}");
                }
            }
        }
    }

    if rejected > 0 {
        bail!("{rejected} Run manifest(s) rejected");
    }
    Ok(())
}

/// `runbridge translate`
pub fn translate_file(path: &Path) -> Result<()> {
    for run in load_runs(path)? {
        let execution = run
            .outcome
            .with_context(|| format!("{} is not a valid Run", run.name))?;
        print!("---\n{}", serde_yaml::to_string(&execution)?);
    }
    Ok(())
}
