//! Process isolation for untrusted code
//!
//! This module confines a child process between fork and exec: a seccomp
//! syscall policy, kernel resource limits and an optional privilege drop, in
//! that order. It also holds the runner command line shared by the
//! orchestrator and the runner binary, process-group spawning for the
//! orchestrator, and the resource usage side channel.

use std::io;
use std::sync::Arc;

use seccompiler::BpfProgram;
use thiserror::Error;
use tracing::debug;

use crate::config::Credentials;
pub use crate::sandbox::command::RunnerCommand;
pub use crate::sandbox::limits::{apply_limits, cpu_seconds, reap_with_usage, wait_exited};
pub use crate::sandbox::policy::{Action, ArgCondition, Rule, SyscallPolicy, syscall_number};
pub use crate::sandbox::privilege::drop_privileges;
pub use crate::sandbox::process::{ProcessKiller, SandboxProcess};
pub use crate::sandbox::stats::{STATS_PREFIX, StatsParseError, is_stats_line};
use crate::types::ResourceLimits;

mod command;
mod limits;
mod policy;
mod privilege;
mod process;
mod stats;

/// Errors that occur while building or applying isolation
#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("failed to build syscall policy: {0}")]
    Policy(String),

    #[error("cannot switch to uid {uid}: not running as root")]
    NotPrivileged { uid: u32 },

    #[error("failed to spawn sandboxed process: {0}")]
    SpawnFailed(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Everything applied to a child after fork and before exec
///
/// The syscall filter is compiled up front so the child only has to load
/// it. Steps run in a fixed order: policy, limits, privilege drop.
#[derive(Debug, Clone)]
pub struct Isolation {
    filter: Option<Arc<BpfProgram>>,
    limits: ResourceLimits,
    credentials: Option<Credentials>,
}

impl Isolation {
    /// Isolation that only applies resource limits
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            filter: None,
            limits,
            credentials: None,
        }
    }

    /// Compile and attach a syscall policy
    pub fn with_policy(mut self, policy: &SyscallPolicy) -> Result<Self, IsolationError> {
        let program = policy.compile()?;
        debug!(
            rules = policy.rules().len(),
            instructions = program.len(),
            "compiled syscall policy"
        );
        self.filter = Some(Arc::new(program));
        Ok(self)
    }

    /// Drop to `credentials` before exec
    pub fn with_credentials(
        mut self,
        credentials: Option<Credentials>,
    ) -> Result<Self, IsolationError> {
        if let Some(creds) = credentials
            && !privilege::can_drop_privileges()
        {
            return Err(IsolationError::NotPrivileged { uid: creds.uid });
        }
        self.credentials = credentials;
        Ok(self)
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn has_policy(&self) -> bool {
        self.filter.is_some()
    }

    /// Apply every step to the calling process
    ///
    /// Meant to run in the child right before exec. The first failing step
    /// aborts; nothing after it runs.
    pub fn apply(&self) -> io::Result<()> {
        if let Some(filter) = &self.filter {
            seccompiler::apply_filter(filter).map_err(io::Error::other)?;
        }
        apply_limits(&self.limits)?;
        if let Some(credentials) = self.credentials {
            drop_privileges(credentials)?;
        }
        Ok(())
    }

    /// Register [`apply`](Self::apply) as the command's pre-exec hook
    pub fn install(&self, command: &mut tokio::process::Command) {
        let isolation = self.clone();
        // SAFETY: the hook only performs prctl/seccomp/setrlimit/setres*id
        // calls on memory prepared before fork
        unsafe {
            command.pre_exec(move || isolation.apply());
        }
    }
}
