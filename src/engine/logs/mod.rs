//! Following a step's container output.
//!
//! The log endpoint is opened with `follow=true`, so the returned stream stays
//! open while the container runs and ends when the cluster closes the
//! connection. The `kube` implementation pumps the response body into an
//! in-memory pipe from a spawned task, so the stream handed to callers borrows
//! nothing from the client. Dropping the stream closes the pipe, which ends
//! the task.

use std::future::Future;
use std::pin::Pin;

use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::LogParams;
use tokio::io::{AsyncRead, DuplexStream};
use tokio::sync::oneshot;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::{debug, info};

use super::naming::sanitize;
use super::step::Step;
use crate::error::{ClusterError, PodstepError};

/// Buffer size of the pipe between the log task and the reader.
const LOG_PIPE_CAPACITY: usize = 64 * 1024;

/// A live byte stream of a container's combined output.
pub type LogStream = Pin<Box<dyn AsyncRead + Send>>;

/// Boxed future type returned by [`PodLogClient`] implementors.
pub type LogStreamFuture<'a> =
    Pin<Box<dyn Future<Output = Result<LogStream, kube::Error>> + Send + 'a>>;

/// Log access required from the cluster API.
pub trait PodLogClient {
    /// Open a following log stream for pod `name` in `namespace`.
    fn follow_logs(&self, namespace: String, name: String) -> LogStreamFuture<'_>;
}

impl PodLogClient for kube::Client {
    fn follow_logs(&self, namespace: String, name: String) -> LogStreamFuture<'_> {
        let api: Api<Pod> = Api::namespaced(self.clone(), &namespace);
        Box::pin(async move {
            let (reader, writer) = tokio::io::duplex(LOG_PIPE_CAPACITY);
            let (opened_tx, opened_rx) = oneshot::channel();

            tokio::spawn(async move {
                let params = LogParams {
                    follow: true,
                    ..LogParams::default()
                };
                match api.log_stream(&name, &params).await {
                    Ok(body) => {
                        if opened_tx.send(Ok(())).is_ok() {
                            forward(body, writer).await;
                        }
                    }
                    Err(error) => {
                        if opened_tx.send(Err(error)).is_err() {
                            debug!(pod = %name, "log stream requester went away");
                        }
                    }
                }
            });

            match opened_rx.await {
                Ok(Ok(())) => Ok(Box::pin(reader) as LogStream),
                Ok(Err(error)) => Err(error),
                Err(_) => Err(kube::Error::ReadEvents(std::io::Error::other(
                    "log task ended before the stream was opened",
                ))),
            }
        })
    }
}

/// Copy a response body into the pipe until either side closes.
async fn forward<R>(body: R, mut writer: DuplexStream)
where
    R: futures_util::io::AsyncRead,
{
    let mut source = Box::pin(body).compat();
    match tokio::io::copy(&mut source, &mut writer).await {
        Ok(bytes) => debug!(bytes, "log stream ended"),
        Err(error) => debug!(error = %error, "log stream interrupted"),
    }
}

/// Open the following log stream for `step`'s pod in `namespace`.
///
/// # Errors
///
/// Returns `ClusterError::LogStreamFailed` when the stream cannot be opened.
pub async fn follow<C: PodLogClient + ?Sized>(
    client: &C,
    namespace: &str,
    step: &Step,
) -> Result<LogStream, PodstepError> {
    let name = sanitize(step.name());

    let stream = client
        .follow_logs(String::from(namespace), name.clone())
        .await
        .map_err(|error| {
            PodstepError::from(ClusterError::LogStreamFailed {
                pod: name.clone(),
                message: error.to_string(),
            })
        })?;

    info!(pod = %name, namespace, "following pod logs");
    Ok(stream)
}
