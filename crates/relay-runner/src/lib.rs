//! Supervisor for the relay's long-lived tasks.
//!
//! Each registered process receives a child of the shared cancellation token
//! and runs until it finishes or the token fires. SIGINT/SIGTERM cancel the
//! token; so does the first process to finish, since a relay without its
//! transport session or its upload worker has nothing left to do.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

type ProcessFn = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

pub struct Runner {
    processes: Vec<(String, ProcessFn)>,
    cancellation_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            cancellation_token: CancellationToken::new(),
            shutdown_timeout: Duration::from_secs(10),
        }
    }

    /// Register a named long-lived process. The name is used only for log
    /// attribution.
    pub fn with_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes
            .push((name.into(), Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Use an externally owned cancellation token instead of a fresh one.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// How long to wait for the remaining processes after cancellation
    /// before aborting them. Default 10 seconds.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Run every registered process to completion.
    ///
    /// Returns the first process error, if any. A clean signal-driven
    /// shutdown returns `Ok(())`.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        let mut join_set: JoinSet<(String, anyhow::Result<()>)> = JoinSet::new();

        for (name, process) in self.processes {
            let process_token = token.child_token();
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        spawn_signal_listener(token.clone());

        // The first process to finish, for whatever reason, winds the whole
        // application down.
        let mut first_error = None;
        if let Some(joined) = join_set.join_next().await {
            record_outcome(joined, &mut first_error);
            token.cancel();
        }

        let drain = async {
            while let Some(joined) = join_set.join_next().await {
                record_outcome(joined, &mut first_error);
            }
        };
        if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
            warn!(
                timeout_secs = self.shutdown_timeout.as_secs(),
                "shutdown timeout elapsed, aborting remaining processes"
            );
            join_set.shutdown().await;
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn record_outcome(
    joined: Result<(String, anyhow::Result<()>), tokio::task::JoinError>,
    first_error: &mut Option<anyhow::Error>,
) {
    match joined {
        Ok((name, Ok(()))) => info!(process = %name, "process finished"),
        Ok((name, Err(err))) => {
            error!(process = %name, error = format!("{err:#}"), "process failed");
            if first_error.is_none() {
                *first_error = Some(err);
            }
        }
        Err(err) => {
            error!(error = %err, "process panicked");
            if first_error.is_none() {
                *first_error = Some(anyhow::anyhow!("process panicked: {err}"));
            }
        }
    }
}

fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn({
        let token = token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received interrupt signal");
                    token.cancel();
                }
                Err(err) => {
                    error!(error = %err, "failed to install interrupt handler");
                }
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM");
                token.cancel();
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_finished_process_cancels_the_rest() {
        let observed_cancel = Arc::new(AtomicBool::new(false));
        let flag = observed_cancel.clone();

        let result = Runner::new()
            .with_process("short-lived", |_token| async { Ok(()) })
            .with_process("long-lived", move |token| async move {
                token.cancelled().await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .run()
            .await;

        assert!(result.is_ok());
        assert!(observed_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_first_process_error_is_returned() {
        let result = Runner::new()
            .with_process("failing", |_token| async {
                Err(anyhow::anyhow!("broker unreachable"))
            })
            .with_process("long-lived", |token| async move {
                token.cancelled().await;
                Ok(())
            })
            .run()
            .await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("broker unreachable"));
    }

    #[tokio::test]
    async fn test_external_cancellation_shuts_everything_down() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = Runner::new()
            .with_cancellation_token(token)
            .with_process("long-lived", |token| async move {
                token.cancelled().await;
                Ok(())
            })
            .run()
            .await;

        assert!(result.is_ok());
    }
}
