//! `podstep` application entry point.
//!
//! This binary runs pipeline steps as single pods on a Kubernetes cluster. It
//! uses `eyre` for opaque error handling at the application boundary,
//! converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/podstep/config.toml` or path from `PODSTEP_CONFIG_PATH`)
//! 3. Environment variables (`PODSTEP_*`)
//! 4. Command-line arguments
//!
//! Step output is written to stdout; diagnostics go to stderr through
//! `tracing`, filtered by `RUST_LOG`.

use std::process::ExitCode;

use clap::Parser;
use eyre::{Report, Result as EyreResult};
use podstep::api::{
    CommandOutcome, RunStepParams, TailParams, connect_engine, destroy_namespace, run_step,
    setup_namespace, tail_step, wait_step,
};
use podstep::config::{AppConfig, Cli, Commands, RunArgs, load_config};
use podstep::engine::{ClusterConnector, EnvironmentConfig, Step};
use podstep::error::Result as PodstepResult;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Application entry point.
///
/// Loads configuration, connects to the cluster, and dispatches to the
/// requested subcommand. The process exit code is the step's exit code for
/// `run` and `wait`.
fn main() -> EyreResult<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli).map_err(Report::from)?;
    let runtime = ClusterConnector::create_runtime().map_err(Report::from)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let _signal_task = runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling");
            on_interrupt.cancel();
        }
    });

    let outcome = run(&cli, &config, &cancel, runtime.handle()).map_err(Report::from)?;
    Ok(exit_code(outcome))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("podstep=info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Execute the CLI command, returning domain-specific errors.
///
/// Keeps semantic errors inside the run loop so the CLI boundary owns
/// conversion to `eyre::Report`.
fn run(
    cli: &Cli,
    config: &AppConfig,
    cancel: &CancellationToken,
    runtime_handle: &tokio::runtime::Handle,
) -> PodstepResult<CommandOutcome> {
    let engine = connect_engine(
        config,
        &mockable::DefaultEnv::new(),
        cancel.clone(),
        runtime_handle,
    )?;

    match &cli.command {
        Commands::Run(args) => {
            let step = step_from_args(args)?;
            let environment = EnvironmentConfig {
                namespace_labels: args.namespace_options.label_map(),
            };
            let mut stdout = tokio::io::stdout();
            run_step(RunStepParams {
                engine: &engine,
                step: &step,
                environment: &environment,
                keep_namespace: args.keep_namespace,
                output: &mut stdout,
                cancel,
                runtime_handle,
            })
        }
        Commands::Setup(args) => {
            let environment = EnvironmentConfig {
                namespace_labels: args.label_map(),
            };
            setup_namespace(&engine, &environment, runtime_handle)
        }
        Commands::Destroy => {
            destroy_namespace(&engine, &EnvironmentConfig::default(), runtime_handle)
        }
        Commands::Logs(args) => {
            let step = Step::reference(args.name.as_str())?;
            let mut stdout = tokio::io::stdout();
            tail_step(TailParams {
                engine: &engine,
                step: &step,
                output: &mut stdout,
                cancel,
                runtime_handle,
            })
        }
        Commands::Wait(args) => {
            let step = Step::reference(args.name.as_str())?;
            wait_step(&engine, &step, runtime_handle)
        }
    }
}

fn step_from_args(args: &RunArgs) -> PodstepResult<Step> {
    Ok(Step::new(args.name.as_str(), args.image.as_str())?
        .with_working_dir(args.workdir.clone().unwrap_or_default())
        .with_environment(args.environment())
        .with_entrypoint(args.entrypoint.clone())
        .with_command(args.command.clone()))
}

/// Map a command outcome to a process exit code.
///
/// Codes outside `1..=255` become `1`.
fn exit_code(outcome: CommandOutcome) -> ExitCode {
    match outcome {
        CommandOutcome::Success => ExitCode::SUCCESS,
        CommandOutcome::CommandExit { code } => u8::try_from(code)
            .ok()
            .filter(|value| *value != 0)
            .map_or(ExitCode::FAILURE, ExitCode::from),
    }
}
