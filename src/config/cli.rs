//! Command-line argument definitions for podstep.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Command-line interface for podstep.
#[derive(Debug, Parser)]
#[command(name = "podstep")]
#[command(
    author,
    version,
    about = "Run pipeline steps as single pods on a Kubernetes cluster"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Kubeconfig file to use.
    #[arg(long, global = true)]
    pub kubeconfig: Option<Utf8PathBuf>,

    /// Kubeconfig context to use.
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Namespace owned by this run.
    #[arg(long, global = true)]
    pub namespace: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one step to completion and exit with its exit code.
    Run(RunArgs),

    /// Create the namespace if it does not exist.
    Setup(NamespaceArgs),

    /// Delete the namespace and every pod in it.
    Destroy,

    /// Follow the output of a started step.
    Logs(StepRefArgs),

    /// Wait for a started step to finish and exit with its exit code.
    Wait(StepRefArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Step identifier; the pod is named after it.
    #[arg(long, required = true)]
    pub name: String,

    /// Container image to run.
    #[arg(long, required = true)]
    pub image: String,

    /// Working directory inside the container.
    #[arg(long)]
    pub workdir: Option<String>,

    /// Environment variable for the step, as `KEY=VALUE`. Repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Entrypoint token placed before the command. Repeatable.
    #[arg(long, allow_hyphen_values = true)]
    pub entrypoint: Vec<String>,

    /// Leave the namespace in place after the step finishes.
    #[arg(long)]
    pub keep_namespace: bool,

    /// Namespace options applied when the namespace is created.
    #[command(flatten)]
    pub namespace_options: NamespaceArgs,

    /// Command to run, after the entrypoint.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Return the step environment as a map; later duplicates win.
    #[must_use]
    pub fn environment(&self) -> BTreeMap<String, String> {
        self.env.iter().cloned().collect()
    }
}

/// Options for namespace creation.
#[derive(Debug, Clone, Default, Args)]
pub struct NamespaceArgs {
    /// Label applied to the namespace, as `KEY=VALUE`. Repeatable.
    #[arg(long = "label", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub labels: Vec<(String, String)>,
}

impl NamespaceArgs {
    /// Return the labels as a map; later duplicates win.
    #[must_use]
    pub fn label_map(&self) -> BTreeMap<String, String> {
        self.labels.iter().cloned().collect()
    }
}

/// Arguments naming an already started step.
#[derive(Debug, Parser)]
pub struct StepRefArgs {
    /// Step identifier used when the step was run.
    #[arg(required = true)]
    pub name: String,
}

/// Parse a `KEY=VALUE` pair. The value may be empty or contain `=`.
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;

    if key.trim().is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }

    Ok((String::from(key), String::from(value)))
}
