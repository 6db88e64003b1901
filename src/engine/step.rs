//! Step descriptors and execution results exchanged with the pipeline engine.

use std::collections::BTreeMap;

use crate::error::{ConfigError, PodstepError};

/// One unit of pipeline work, executed as a single container in a single pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    name: String,
    image: String,
    working_dir: String,
    environment: BTreeMap<String, String>,
    entrypoint: Vec<String>,
    command: Vec<String>,
}

impl Step {
    /// Create a step with a name and image.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `name` or `image` is empty
    /// or whitespace-only.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Result<Self, PodstepError> {
        let name_value = name.into();
        let image_value = image.into();
        let validated_name = String::from(validate_required_field("step.name", &name_value)?);
        let validated_image = String::from(validate_required_field("step.image", &image_value)?);

        Ok(Self {
            name: validated_name,
            image: validated_image,
            working_dir: String::new(),
            environment: BTreeMap::new(),
            entrypoint: Vec::new(),
            command: Vec::new(),
        })
    }

    /// Create a step that only addresses an already started pod by name.
    ///
    /// Such a step is enough for `wait` and `tail`, which never read the
    /// image, but must not be passed to `exec`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `name` is empty or
    /// whitespace-only.
    pub fn reference(name: impl Into<String>) -> Result<Self, PodstepError> {
        let name_value = name.into();
        let validated_name = String::from(validate_required_field("step.name", &name_value)?);

        Ok(Self {
            name: validated_name,
            image: String::new(),
            working_dir: String::new(),
            environment: BTreeMap::new(),
            entrypoint: Vec::new(),
            command: Vec::new(),
        })
    }

    /// Set the working directory inside the container.
    #[must_use]
    pub fn with_working_dir(mut self, working_dir: impl Into<String>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    /// Set the environment variables passed to the container.
    #[must_use]
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Set the entrypoint tokens.
    #[must_use]
    pub fn with_entrypoint(mut self, entrypoint: Vec<String>) -> Self {
        self.entrypoint = entrypoint;
        self
    }

    /// Set the command tokens appended after the entrypoint.
    #[must_use]
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Return the caller-supplied step identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the container image reference.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Return the working directory, empty when the image default applies.
    #[must_use]
    pub fn working_dir(&self) -> &str {
        &self.working_dir
    }

    /// Return the environment variables.
    #[must_use]
    pub const fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Return the entrypoint tokens.
    #[must_use]
    pub fn entrypoint(&self) -> &[String] {
        &self.entrypoint
    }

    /// Return the command tokens.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }
}

/// Environment configuration handed to `setup` and `destroy`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Labels applied to the namespace when it is created.
    pub namespace_labels: BTreeMap<String, String>,
}

/// How a step's container finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Whether the container exited.
    pub exited: bool,
    /// The exit code of the step's container.
    pub exit_code: i32,
    /// Whether the container was killed for exceeding its memory limit.
    ///
    /// Always `false`: memory kills are not detected.
    pub oom_killed: bool,
}

impl ExecutionResult {
    /// Build the result for a container that exited with `exit_code`.
    #[must_use]
    pub const fn exited_with(exit_code: i32) -> Self {
        Self {
            exited: true,
            exit_code,
            oom_killed: false,
        }
    }

    /// Whether the step succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.exited && self.exit_code == 0
    }
}

fn validate_required_field<'a>(field: &str, value: &'a str) -> Result<&'a str, PodstepError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PodstepError::from(ConfigError::MissingRequired {
            field: String::from(field),
        }));
    }

    Ok(trimmed)
}
