//! Configuration data types for podstep.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::engine::PollPolicy;
use crate::error::ConfigError;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "podstep";

/// Pod polling configuration.
///
/// A timeout of `0` disables that timeout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between two observations of a pod, in milliseconds.
    pub interval_ms: u64,

    /// Longest time a pod may stay pending, in seconds.
    pub start_timeout_secs: u64,

    /// Longest time a started pod may run, in seconds.
    pub completion_timeout_secs: u64,

    /// How many times one lookup retries a transport failure.
    pub lookup_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            start_timeout_secs: 600,
            completion_timeout_secs: 0,
            lookup_retries: 0,
        }
    }
}

impl PollConfig {
    /// Convert to the policy used by the engine.
    #[must_use]
    pub const fn to_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.interval_ms),
            start_timeout: optional_secs(self.start_timeout_secs),
            completion_timeout: optional_secs(self.completion_timeout_secs),
            lookup_retries: self.lookup_retries,
        }
    }
}

const fn optional_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `PODSTEP_CONFIG_PATH` environment variable
/// 2. `.podstep.toml` in the current working directory
/// 3. `.podstep.toml` in the home directory
/// 4. `~/.config/podstep/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "PODSTEP",
    post_merge_hook,
    discovery(
        app_name = "podstep",
        env_var = "PODSTEP_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".podstep.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// Namespace owned by this run; defaults to [`DEFAULT_NAMESPACE`].
    pub namespace: Option<String>,

    /// Kubeconfig file to load instead of the inferred one.
    pub kubeconfig: Option<Utf8PathBuf>,

    /// Kubeconfig context to use instead of the current one.
    pub context: Option<String>,

    /// Pod polling configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub poll: PollConfig,
}

impl AppConfig {
    /// Return the configured namespace, or [`DEFAULT_NAMESPACE`].
    #[must_use]
    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Return the poll policy described by `[poll]`.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        self.poll.to_policy()
    }

    /// Check values the type system cannot.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when the namespace is blank or the
    /// poll interval is zero.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.namespace_or_default().trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: String::from("namespace"),
                reason: String::from("must not be empty"),
            }
            .into());
        }

        if self.poll.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: String::from("poll.interval_ms"),
                reason: String::from("must be greater than zero"),
            }
            .into());
        }

        Ok(())
    }
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        if let Some(namespace) = self.namespace.as_mut() {
            let trimmed = namespace.trim();
            if trimmed.len() != namespace.len() {
                *namespace = String::from(trimmed);
            }
        }
        self.kubeconfig = self
            .kubeconfig
            .take()
            .filter(|path| !path.as_str().trim().is_empty());
        self.context = self
            .context
            .take()
            .filter(|context| !context.trim().is_empty());
        Ok(())
    }
}
