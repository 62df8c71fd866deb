//! Sandbox runner for goplay
//!
//! The code behind the `goplay-runner` binary: build (or test) the workspace
//! with the variant's toolchain, run the artifact under isolation and a
//! wall-clock limit, and turn the outcome into an exit code.
//!
//! ```text
//! Init -> BuildFlow -> Isolate -> Execute -> { Completed, TimedOut, Failed }
//!      -> TestFlow  -> Isolate -> Execute -> { Completed, TimedOut, Failed }
//! ```

use std::path::PathBuf;
use std::process::ExitStatus;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, instrument};

pub use crate::runner::build::{build, build_dir};
pub use crate::runner::execute::{execute, run_tests};

mod build;
mod execute;

use crate::config::Credentials;
use crate::sandbox::{Isolation, IsolationError, SyscallPolicy};
use crate::types::{
    BUILD_FAILED_EXIT_CODE, ExecutionStats, Mode, ResourceLimits, SETUP_FAILED_EXIT_CODE,
    TIMEOUT_EXIT_CODE,
};

/// Errors that end a runner invocation
///
/// Every variant is terminal; none is retried.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("sandbox setup failed: {0}")]
    Setup(#[from] IsolationError),

    #[error("failed to start toolchain: {0}")]
    Toolchain(#[source] std::io::Error),

    #[error("build failed with exit status {status}")]
    Build { status: i32 },

    #[error("exit status {status}")]
    Execution { status: i32 },

    #[error("execution timed out")]
    Timeout,
}

impl RunnerError {
    /// Exit code the runner process reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerError::Workspace(_) | RunnerError::Setup(_) | RunnerError::Toolchain(_) => {
                SETUP_FAILED_EXIT_CODE
            }
            RunnerError::Build { .. } => BUILD_FAILED_EXIT_CODE,
            RunnerError::Timeout => TIMEOUT_EXIT_CODE,
            RunnerError::Execution { status } => program_exit_code(*status),
        }
    }

    /// Wrapper log line printed to stderr before exiting, if any
    ///
    /// Build and execution failures use the `YYYY/MM/DD HH:MM:SS` shape the
    /// output filter suppresses; setup failures are shown to the caller.
    pub fn failure_line(&self, now: DateTime<Local>) -> Option<String> {
        let stamp = now.format("%Y/%m/%d %H:%M:%S");
        match self {
            RunnerError::Build { status } => Some(format!("{stamp} Build error: exit status {status}")),
            RunnerError::Execution { status } => {
                Some(format!("{stamp} Execution error: exit status {status}"))
            }
            RunnerError::Timeout => None,
            other => Some(format!("{stamp} Sandbox error: {other}")),
        }
    }
}

/// Mirror a program's exit status without colliding with reserved codes
pub fn program_exit_code(status: i32) -> i32 {
    match status {
        0 | TIMEOUT_EXIT_CODE | SETUP_FAILED_EXIT_CODE | BUILD_FAILED_EXIT_CODE => 1,
        s if (1..=255).contains(&s) => s,
        _ => 1,
    }
}

/// Exit status as a shell would report it: the code, or 128 + signal
pub(crate) fn status_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

/// One runner invocation
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub mode: Mode,

    /// Workspace holding the source and go.mod
    pub workspace: PathBuf,

    /// The variant's `go` binary
    pub go_binary: PathBuf,

    pub limits: ResourceLimits,

    /// Load the seccomp filter before running untrusted code
    pub syscall_filter: bool,

    pub allow_network: bool,

    pub run_as: Option<Credentials>,
}

impl RunSpec {
    /// Build the isolation for this invocation
    ///
    /// The syscall policy is compiled here, before any child is forked.
    pub fn isolation(&self) -> Result<Isolation, IsolationError> {
        let mut isolation =
            Isolation::new(self.limits.clone()).with_credentials(self.run_as)?;
        if self.syscall_filter {
            let policy =
                SyscallPolicy::for_mode(self.mode, self.allow_network, self.run_as.is_some());
            isolation = isolation.with_policy(&policy)?;
        }
        Ok(isolation)
    }
}

/// Run the whole state machine for `spec`
///
/// On success returns the resource usage of the run.
#[instrument(skip(spec), fields(mode = %spec.mode, workspace = %spec.workspace.display()))]
pub async fn run(spec: &RunSpec) -> Result<ExecutionStats, RunnerError> {
    if !spec.workspace.is_dir() {
        return Err(RunnerError::Workspace(format!(
            "{} is not a directory",
            spec.workspace.display()
        )));
    }

    let isolation = spec.isolation()?;
    debug!(policy = isolation.has_policy(), "isolation prepared");

    match spec.mode {
        Mode::Test => run_tests(spec, &isolation).await,
        Mode::Program => {
            let out_dir = build_dir(spec)?;
            let artifact = build(spec, out_dir.path()).await?;
            let stats = execute(spec, &artifact, &isolation).await;
            if let Err(e) = out_dir.close() {
                debug!(error = %e, "failed to remove build directory");
            }
            stats
        }
    }
}
