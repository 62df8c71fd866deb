//! Execution orchestrator
//!
//! Turns one [`ExecutionRequest`] into a stream of [`OutputEvent`]s: a
//! workspace is prepared, the sandbox runner is spawned in its own process
//! group, both pipes are read concurrently into a single channel, and exactly
//! one terminal event (`done`, `error` or `timeout`) closes the stream.
//!
//! The stream ends without a terminal event only when the caller dropped it.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, info, info_span, warn};

pub use crate::orchestrator::event::{EventKind, OutputEvent};
pub use crate::orchestrator::filter::OutputFilter;
pub use crate::orchestrator::reader::{Frame, LineFramer, ReaderOutcome, StreamReader};

mod event;
mod filter;
mod reader;

use crate::config::{Config, ConfigError, Variant};
use crate::sandbox::{IsolationError, RunnerCommand, SandboxProcess};
use crate::types::{ExecutionRequest, ExecutionStats, RunStatus};
use crate::workspace::{Workspace, WorkspaceError};

/// Events buffered between the readers and the caller
const CHANNEL_CAPACITY: usize = 64;

pub const DONE_MESSAGE: &str = "Execution finished.";
pub const BUILD_FAILED_MESSAGE: &str = "Build failed.";
pub const SETUP_FAILED_MESSAGE: &str = "Sandbox setup failed.";
pub const RESOLVE_FAILED_MESSAGE: &str = "Dependency resolution failed.";

/// Stream of events for one execution
pub type EventStream = ReceiverStream<OutputEvent>;

/// Errors raised before an execution starts streaming
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid output filter: {0}")]
    Filter(#[from] regex::Error),
}

/// Message carried by the `timeout` event
pub fn timeout_message(seconds: f64) -> String {
    format!("Execution timed out ({seconds}s).")
}

/// Runs requests against the configured variants
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Arc<Config>,
    filter: Arc<OutputFilter>,
    permits: Option<Arc<Semaphore>>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Result<Self, OrchestratorError> {
        let filter = OutputFilter::new(&config.workspace_root, &config.module_name)?;
        let permits = config.max_concurrent.map(|n| Arc::new(Semaphore::new(n)));
        Ok(Self {
            config: Arc::new(config),
            filter: Arc::new(filter),
            permits,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn filter(&self) -> &OutputFilter {
        &self.filter
    }

    /// Start an execution
    ///
    /// The variant is resolved up front, so an unknown `version` fails here
    /// instead of in the stream. Everything else is reported as events.
    /// Dropping the stream kills the runner.
    pub fn execute(&self, request: ExecutionRequest) -> Result<EventStream, OrchestratorError> {
        let variant_id = self.config.resolve_variant(request.variant())?.to_owned();
        let variant = self.config.get_variant(&variant_id)?.clone();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let span = info_span!("execute", variant = %variant_id, mode = %request.mode());
        let this = self.clone();
        tokio::spawn(async move { this.drive(request, variant, tx).await }.instrument(span));

        Ok(ReceiverStream::new(rx))
    }

    async fn drive(self, request: ExecutionRequest, variant: Variant, tx: mpsc::Sender<OutputEvent>) {
        let _permit = match &self.permits {
            Some(permits) => {
                let acquired = tokio::select! {
                    biased;
                    _ = tx.closed() => {
                        debug!("caller disconnected while queued");
                        return;
                    }
                    acquired = permits.clone().acquire_owned() => acquired,
                };
                match acquired {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        let _ = tx.send(OutputEvent::error(SETUP_FAILED_MESSAGE)).await;
                        return;
                    }
                }
            }
            None => None,
        };

        let mut workspace = match Workspace::prepare(
            &self.config.workspace_root,
            &request,
            &variant,
            &self.config.module_name,
        )
        .await
        {
            Ok(workspace) => workspace,
            Err(e) => {
                warn!(error = %e, "failed to prepare workspace");
                let _ = tx.send(OutputEvent::error(SETUP_FAILED_MESSAGE)).await;
                return;
            }
        };

        let terminal = self.run(&request, &variant, &workspace, &tx).await;

        if let Err(e) = workspace.cleanup() {
            warn!(error = %e, "failed to remove workspace");
        }

        match terminal {
            Some(event) => {
                debug!(kind = %event.kind, payload = %event.payload, "execution finished");
                let _ = tx.send(event).await;
            }
            None => debug!("caller disconnected, no terminal event"),
        }
    }

    /// Everything between workspace creation and cleanup
    ///
    /// Returns the terminal event, or `None` after a disconnect.
    async fn run(
        &self,
        request: &ExecutionRequest,
        variant: &Variant,
        workspace: &Workspace,
        tx: &mpsc::Sender<OutputEvent>,
    ) -> Option<OutputEvent> {
        let env = variant.environment(workspace.path());
        // One budget for dependency resolution and the runner together
        let deadline = Instant::now() + self.config.request_timeout();

        if variant.resolve_dependencies {
            // Dropping the resolve future kills `go mod tidy`
            let resolved = tokio::select! {
                biased;
                _ = tx.closed() => {
                    debug!("caller disconnected during dependency resolution");
                    return None;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    info!("request timeout reached during dependency resolution");
                    return Some(OutputEvent::timeout(timeout_message(self.config.request_timeout)));
                }
                resolved = workspace.resolve_dependencies(variant, &env) => resolved,
            };
            match resolved {
                Ok(()) => {}
                Err(WorkspaceError::Resolve { stderr }) => {
                    for line in stderr.lines() {
                        let Some(line) = self.filter.apply(line) else {
                            continue;
                        };
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(OutputEvent::stderr(line)).await.is_err() {
                            return None;
                        }
                    }
                    return Some(OutputEvent::error(RESOLVE_FAILED_MESSAGE));
                }
                Err(e) => {
                    warn!(error = %e, "failed to resolve dependencies");
                    return Some(OutputEvent::error(SETUP_FAILED_MESSAGE));
                }
            }
        }

        if let Some(credentials) = self.config.isolation.run_as
            && let Err(e) = workspace.grant(credentials)
        {
            warn!(error = %e, "failed to hand over workspace");
            return Some(OutputEvent::error(SETUP_FAILED_MESSAGE));
        }

        let args = RunnerCommand::new(
            self.config.runner_binary(),
            workspace.path(),
            variant.go_binary(),
        )
        .mode(request.mode())
        .limits(self.config.limits.clone())
        .isolation(&self.config.isolation)
        .build();

        let mut process = match SandboxProcess::spawn(&args, &env, workspace.path()) {
            Ok(process) => process,
            Err(e) => {
                warn!(error = %e, "failed to start runner");
                return Some(OutputEvent::error(SETUP_FAILED_MESSAGE));
            }
        };
        let killer = process.killer();

        let stdout = process.take_stdout().map(|pipe| {
            let reader = StreamReader::new(EventKind::Stdout, tx.clone(), killer.clone());
            tokio::spawn(reader.run(pipe).in_current_span())
        });
        let stderr = process.take_stderr().map(|pipe| {
            let reader = StreamReader::new(EventKind::Stderr, tx.clone(), killer.clone())
                .with_filter(self.filter.clone());
            tokio::spawn(reader.run(pipe).in_current_span())
        });

        let (status, timed_out) = match tokio::time::timeout_at(deadline, process.wait()).await {
            Ok(status) => (status, false),
            Err(_) => {
                info!(limit = self.config.request_timeout, "request timeout reached, killing runner");
                killer.kill();
                (process.wait().await, true)
            }
        };

        let mut stats = None;
        let mut disconnected = false;
        for handle in [stdout, stderr].into_iter().flatten() {
            match handle.await {
                Ok(outcome) => {
                    disconnected |= outcome.disconnected;
                    stats = stats.or(outcome.stats);
                }
                Err(e) => warn!(error = %e, "output reader failed"),
            }
        }

        if disconnected || tx.is_closed() {
            return None;
        }

        if timed_out {
            return Some(OutputEvent::timeout(timeout_message(self.config.request_timeout)));
        }

        Some(self.classify(status, stats))
    }

    fn classify(
        &self,
        status: Result<ExitStatus, IsolationError>,
        stats: Option<ExecutionStats>,
    ) -> OutputEvent {
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "failed to wait for runner");
                return OutputEvent::error(SETUP_FAILED_MESSAGE);
            }
        };

        match RunStatus::from_exit(status.code(), status.signal()) {
            RunStatus::Completed => {
                if let Some(stats) = stats {
                    info!(usage = %stats.summary(), "execution completed");
                }
                OutputEvent::done(DONE_MESSAGE)
            }
            RunStatus::TimedOut => {
                OutputEvent::timeout(timeout_message(self.config.limits.wall_time_limit))
            }
            RunStatus::BuildFailed => OutputEvent::error(BUILD_FAILED_MESSAGE),
            RunStatus::SetupFailed => OutputEvent::error(SETUP_FAILED_MESSAGE),
            RunStatus::Failed(code) => OutputEvent::error(format!("exit status {code}")),
            RunStatus::Signaled(signal) => OutputEvent::error(format!("signal: {signal}")),
        }
    }
}
