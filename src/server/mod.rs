//! Server module for Runbridge
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Configuration sanity checks
//! - `manifests`: `Run` / `Build` / `BuildRun` manifest parsing and store seeding
//! - `init`: Store setup and the controller run loop

pub mod config;
mod init;
mod loader;
pub mod manifests;
mod validation;

pub use init::run;
