//! Configuration system for podstep.
//!
//! This module provides the configuration structures, CLI definitions, and the
//! layered loader for the podstep application. Precedence: CLI flags override
//! environment variables, which override configuration files, which override
//! defaults.
//!
//! The configuration file is expected at `~/.config/podstep/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! namespace = "ci-run-42"
//! kubeconfig = "/home/user/.kube/config"
//! context = "staging"
//!
//! [poll]
//! interval_ms = 500
//! start_timeout_secs = 600
//! completion_timeout_secs = 3600
//! lookup_retries = 2
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, NamespaceArgs, RunArgs, StepRefArgs};
pub use loader::{env_var_names, load_config};
pub use types::{AppConfig, DEFAULT_NAMESPACE, PollConfig};
