use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::core::engine::ActionEngine;
use crate::error::EngineError;
use crate::pacing::Clock;

/// A flow stopped the whole runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("flow {flow} hit a fatal error: {message}")]
pub struct FatalError {
    pub flow: String,
    pub message: String,
}

#[derive(Clone)]
struct Reporter {
    shutdown: CancellationToken,
    fatal: Arc<OnceLock<FatalError>>,
}

impl Reporter {
    fn report(&self, flow: &str, err: &EngineError) {
        if err.is_fatal() {
            error!(flow, error = %err, "fatal error, shutting down");
            let _ = self.fatal.set(FatalError {
                flow: flow.to_string(),
                message: err.to_string(),
            });
            self.shutdown.cancel();
        } else {
            warn!(flow, error = %err, "flow failed");
        }
    }
}

/// Runs flows now, in the background, or periodically, and waits for all
/// of them before shutdown. A failing flow never affects its siblings,
/// except for fatal errors, which stop everything.
pub struct Runtime {
    engine: Arc<ActionEngine>,
    clock: Arc<dyn Clock>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    reporter: Reporter,
}

impl Runtime {
    pub fn new(engine: Arc<ActionEngine>, clock: Arc<dyn Clock>) -> Self {
        let shutdown = engine.shutdown_token();
        Runtime {
            engine,
            clock,
            tracker: TaskTracker::new(),
            reporter: Reporter {
                shutdown: shutdown.clone(),
                fatal: Arc::new(OnceLock::new()),
            },
            shutdown,
        }
    }

    pub fn engine(&self) -> &Arc<ActionEngine> {
        &self.engine
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs `flow` to completion in place.
    pub async fn run_once<F, Fut, T>(&self, name: &str, flow: F) -> Result<T, EngineError>
    where
        F: FnOnce(Arc<ActionEngine>) -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let result = flow(self.engine.clone()).await;
        if let Err(e) = &result {
            self.reporter.report(name, e);
        }
        result
    }

    /// Runs `flow` once in the background.
    pub fn spawn<F, Fut, T>(&self, name: impl Into<String>, flow: F)
    where
        F: FnOnce(Arc<ActionEngine>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, EngineError>> + Send + 'static,
        T: Send + 'static,
    {
        let name = name.into();
        let engine = self.engine.clone();
        let reporter = self.reporter.clone();
        self.tracker.spawn(async move {
            info!(flow = %name, "flow started");
            match flow(engine).await {
                Ok(_) => info!(flow = %name, "flow finished"),
                Err(e) => reporter.report(&name, &e),
            }
        });
    }

    /// Runs `flow` in the background every `every`, the first time after
    /// one period, until shutdown. Periods are measured from the start of
    /// each run; ticks missed by a long run are skipped.
    pub fn spawn_periodic<F, Fut, T>(&self, name: impl Into<String>, every: Duration, flow: F)
    where
        F: Fn(Arc<ActionEngine>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, EngineError>> + Send + 'static,
        T: Send + 'static,
    {
        let name = name.into();
        let engine = self.engine.clone();
        let clock = self.clock.clone();
        let reporter = self.reporter.clone();
        let shutdown = self.shutdown.clone();
        self.tracker.spawn(async move {
            info!(flow = %name, every_secs = every.as_secs(), "periodic flow scheduled");
            let mut wait = every;
            loop {
                tokio::select! {
                    _ = clock.sleep(wait) => {}
                    _ = shutdown.cancelled() => {}
                }
                if shutdown.is_cancelled() {
                    break;
                }
                let started = clock.now();
                match flow(engine.clone()).await {
                    Ok(_) => debug!(flow = %name, "periodic run finished"),
                    Err(e) => reporter.report(&name, &e),
                }
                let elapsed = (clock.now() - started).to_std().unwrap_or_default();
                wait = until_next_tick(every, elapsed);
            }
            info!(flow = %name, "periodic flow stopped");
        });
    }

    /// Asks every flow to stop at its next suspension point.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn fatal_error(&self) -> Option<FatalError> {
        self.reporter.fatal.get().cloned()
    }

    /// Waits for every background flow to finish. Returns the fatal error
    /// that stopped the runtime, if any.
    pub async fn wait(&self) -> Result<(), FatalError> {
        self.tracker.close();
        self.tracker.wait().await;
        match self.fatal_error() {
            Some(fatal) => Err(fatal),
            None => Ok(()),
        }
    }
}

/// Time left until the next multiple of `every` after a run that took
/// `elapsed`.
fn until_next_tick(every: Duration, elapsed: Duration) -> Duration {
    if every.is_zero() {
        return every;
    }
    let into_period = elapsed.as_nanos() % every.as_nanos();
    every - Duration::from_nanos(into_period as u64)
}

/// Cancels `token` on Ctrl+C or SIGTERM.
pub fn install_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                        _ = token.cancelled() => return,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = token.cancelled() => return,
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = ctrl_c => info!("received Ctrl+C, initiating shutdown"),
                _ = token.cancelled() => return,
            }
        }

        token.cancel();
    });
}
