//! Running a step end to end and following its output.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::CommandOutcome;
use crate::engine::{Engine, EnvironmentConfig, Step, sanitize};
use crate::error::{ClusterError, PodstepError, Result as PodstepResult};

/// Parameters for running one step to completion.
///
/// Groups the arguments required by [`run_step`] into a single struct to
/// satisfy the "no more than four parameters" convention.
pub struct RunStepParams<'a, W: ?Sized> {
    /// Engine that owns the namespace.
    pub engine: &'a dyn Engine,
    /// The step to run.
    pub step: &'a Step,
    /// Environment handed to setup and destroy.
    pub environment: &'a EnvironmentConfig,
    /// Leave the namespace in place afterwards.
    pub keep_namespace: bool,
    /// Destination for the step's output.
    pub output: &'a mut W,
    /// Token that interrupts waiting and log copying.
    pub cancel: &'a CancellationToken,
    /// Tokio runtime handle for blocking execution.
    pub runtime_handle: &'a tokio::runtime::Handle,
}

/// Parameters for following a started step's output.
pub struct TailParams<'a, W: ?Sized> {
    /// Engine that owns the namespace.
    pub engine: &'a dyn Engine,
    /// The step whose output is followed.
    pub step: &'a Step,
    /// Destination for the step's output.
    pub output: &'a mut W,
    /// Token that interrupts log copying.
    pub cancel: &'a CancellationToken,
    /// Tokio runtime handle for blocking execution.
    pub runtime_handle: &'a tokio::runtime::Handle,
}

/// Run `step` through setup, exec, tail, wait, and destroy.
///
/// The step's output is copied to `output` while it runs. An output stream
/// that cannot be opened or breaks off is logged and does not fail the run;
/// the exit code still comes from `wait`. Unless `keep_namespace` is set the
/// namespace is destroyed afterwards, including after a failure.
///
/// # Errors
///
/// Returns the first error of setup, exec, or wait; a destroy failure is
/// returned only when the step itself succeeded.
pub fn run_step<W>(params: RunStepParams<'_, W>) -> PodstepResult<CommandOutcome>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let RunStepParams {
        engine,
        step,
        environment,
        keep_namespace,
        output,
        cancel,
        runtime_handle,
    } = params;

    runtime_handle.block_on(async move {
        engine.setup(environment).await?;
        let outcome = drive_step(engine, step, output, cancel).await;

        if keep_namespace {
            info!(step = step.name(), "keeping namespace");
            return outcome;
        }

        match (outcome, engine.destroy(environment).await) {
            (Ok(done), Ok(())) => Ok(done),
            (Ok(_), Err(error)) => Err(error),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(teardown)) => {
                warn!(error = %teardown, "namespace teardown failed after step error");
                Err(error)
            }
        }
    })
}

/// Copy a started step's output to `output` until the stream ends.
///
/// # Errors
///
/// Returns `ClusterError::LogStreamFailed` when the stream cannot be opened
/// or breaks off, and `ClusterError::Cancelled` when `cancel` fires.
pub fn tail_step<W>(params: TailParams<'_, W>) -> PodstepResult<CommandOutcome>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let TailParams {
        engine,
        step,
        output,
        cancel,
        runtime_handle,
    } = params;

    runtime_handle.block_on(copy_output(engine, step, output, cancel))?;
    Ok(CommandOutcome::Success)
}

async fn drive_step<W>(
    engine: &dyn Engine,
    step: &Step,
    output: &mut W,
    cancel: &CancellationToken,
) -> PodstepResult<CommandOutcome>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    engine.exec(step).await?;

    match copy_output(engine, step, output, cancel).await {
        Ok(bytes) => debug!(step = step.name(), bytes, "step output ended"),
        Err(error) if cancel.is_cancelled() => return Err(error),
        Err(error) => warn!(step = step.name(), error = %error, "continuing without step output"),
    }

    let result = engine.wait(step).await?;
    Ok(CommandOutcome::from(result))
}

async fn copy_output<W>(
    engine: &dyn Engine,
    step: &Step,
    output: &mut W,
    cancel: &CancellationToken,
) -> PodstepResult<u64>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let pod = sanitize(step.name());
    let mut stream = engine.tail(step).await?;

    let copied = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            return Err(PodstepError::from(ClusterError::Cancelled { pod }));
        }
        result = tokio::io::copy(&mut stream, output) => result,
    };

    let bytes = match copied {
        Ok(bytes) => bytes,
        Err(error) => return Err(log_stream_failed(pod, &error)),
    };
    output
        .flush()
        .await
        .map_err(|error| log_stream_failed(pod, &error))?;
    Ok(bytes)
}

fn log_stream_failed(pod: String, error: &std::io::Error) -> PodstepError {
    PodstepError::from(ClusterError::LogStreamFailed {
        pod,
        message: error.to_string(),
    })
}
