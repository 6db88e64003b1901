//! Configuration loading with layered precedence.
//!
//! This module loads configuration with the precedence order (lowest to
//! highest): application defaults, configuration file, environment variables,
//! command-line arguments.
//!
//! Layers are composed manually with `MergeComposer` rather than through the
//! derived `OrthoConfig::load()`: the `Cli` struct owns subcommand dispatch,
//! `--config` has to be honoured before discovery, and typed environment
//! variables must fail loudly instead of being ignored.
//!
//! # Environment Variable Handling
//!
//! String fields (e.g., `PODSTEP_NAMESPACE`) are always accepted. Numeric
//! fields (e.g., `PODSTEP_POLL_INTERVAL_MS`) must parse or loading fails with
//! `ConfigError::InvalidValue`.

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};
use tracing::debug;

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result};

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Unsigned integer. Invalid values return an error.
    U64,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    /// The environment variable name (e.g., `PODSTEP_NAMESPACE`).
    env_var: &'static str,
    /// The JSON path segments (e.g., `["poll", "interval_ms"]`).
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

/// Table of all environment variables and their JSON paths.
const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "PODSTEP_NAMESPACE",
        path: &["namespace"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "PODSTEP_KUBECONFIG",
        path: &["kubeconfig"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "PODSTEP_CONTEXT",
        path: &["context"],
        var_type: EnvVarType::String,
    },
    // Poll fields
    EnvVarSpec {
        env_var: "PODSTEP_POLL_INTERVAL_MS",
        path: &["poll", "interval_ms"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "PODSTEP_POLL_START_TIMEOUT_SECS",
        path: &["poll", "start_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "PODSTEP_POLL_COMPLETION_TIMEOUT_SECS",
        path: &["poll", "completion_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "PODSTEP_POLL_LOOKUP_RETRIES",
        path: &["poll", "lookup_retries"],
        var_type: EnvVarType::U64,
    },
];

/// Returns the list of environment variable names recognised by the config loader.
///
/// Tests use this to clear every `PODSTEP_*` variable the loader reads.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Load a configuration file and push it to the composer.
///
/// The file is read through `cap_std::fs_utf8`, opening its parent directory
/// first.
fn load_config_file(path: &Utf8PathBuf, composer: &mut MergeComposer) -> Result<()> {
    let current_dir = Utf8PathBuf::from(".");
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| current_dir.as_ref());
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    debug!(path = %path, "loaded configuration file");
    composer.push_file(value, Some(path.clone()));
    Ok(())
}

/// Load configuration with full layer precedence.
///
/// Sources, lowest precedence first:
/// 1. Application defaults
/// 2. Configuration file (`--config`, `PODSTEP_CONFIG_PATH`, or discovery)
/// 3. Environment variables prefixed with `PODSTEP_`
/// 4. Command-line arguments
///
/// The merged configuration is validated before it is returned.
///
/// # Errors
///
/// Returns `ConfigError` if a configuration file is malformed, a typed
/// environment variable does not parse, the layers cannot be merged, or the
/// merged values fail validation.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    let config_path: Option<Utf8PathBuf> =
        cli.config.clone().filter(|p| p.exists()).or_else(|| {
            let discovery = ConfigDiscovery::builder("podstep")
                .env_var("PODSTEP_CONFIG_PATH")
                .config_file_name("config.toml")
                .dotfile_name(".podstep.toml")
                .build();
            discovery
                .candidates()
                .into_iter()
                .filter(|p| p.exists())
                .find_map(|p| Utf8PathBuf::try_from(p).ok())
        });

    if let Some(ref path) = config_path {
        load_config_file(path, &mut composer)?;
    }

    let env_values = collect_env_vars()?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    config.validate()?;

    Ok(config)
}

/// Collect environment variables with the `PODSTEP_` prefix into a JSON value.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a numeric environment variable has
/// an unparseable value.
fn collect_env_vars() -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Ok(raw_value) = std::env::var(spec.env_var) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::U64 => match raw_value.trim().parse::<u64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: spec.env_var.to_owned(),
                        reason: format!("expected unsigned integer, got '{raw_value}'"),
                    }
                    .into());
                }
            },
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

/// Insert a value at a nested path in a JSON map, creating parents as needed.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(field.to_owned(), value);
}

/// Build a JSON value containing CLI overrides.
fn build_cli_overrides(cli: &Cli) -> serde_json::Value {
    let mut overrides = serde_json::Map::new();

    if let Some(ref namespace) = cli.namespace {
        overrides.insert(
            "namespace".to_owned(),
            serde_json::Value::String(namespace.clone()),
        );
    }

    if let Some(ref kubeconfig) = cli.kubeconfig {
        overrides.insert(
            "kubeconfig".to_owned(),
            serde_json::Value::String(kubeconfig.to_string()),
        );
    }

    if let Some(ref context) = cli.context {
        overrides.insert(
            "context".to_owned(),
            serde_json::Value::String(context.clone()),
        );
    }

    if overrides.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::Value::Object(overrides)
    }
}
