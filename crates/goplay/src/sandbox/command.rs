//! Command builder for the sandbox runner
//!
//! Builds the command-line arguments the orchestrator passes to
//! `goplay-runner`. The runner binary parses the same flags.

use std::path::{Path, PathBuf};

use crate::config::{Credentials, IsolationConfig};
use crate::types::{Mode, ResourceLimits};

/// Builder for runner command-line arguments
#[derive(Debug)]
pub struct RunnerCommand {
    /// Path to the runner binary
    runner_path: PathBuf,
    /// --mode
    mode: Mode,
    /// --workspace
    workspace: PathBuf,
    /// --go
    go_binary: PathBuf,
    /// --cpu-time, --memory, --wall-time
    limits: ResourceLimits,
    /// Absent: --no-syscall-filter
    syscall_filter: bool,
    /// --allow-network
    allow_network: bool,
    /// --uid, --gid
    run_as: Option<Credentials>,
}

impl RunnerCommand {
    /// Create a new runner command builder
    pub fn new(
        runner_path: impl Into<PathBuf>,
        workspace: impl Into<PathBuf>,
        go_binary: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner_path: runner_path.into(),
            mode: Mode::Program,
            workspace: workspace.into(),
            go_binary: go_binary.into(),
            limits: ResourceLimits::default(),
            syscall_filter: true,
            allow_network: false,
            run_as: None,
        }
    }

    /// Set the toolchain flow
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set resource limits
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enable or disable the seccomp filter
    pub fn syscall_filter(mut self, enable: bool) -> Self {
        self.syscall_filter = enable;
        self
    }

    /// Allow the guest to open listening sockets
    pub fn allow_network(mut self, enable: bool) -> Self {
        self.allow_network = enable;
        self
    }

    /// Run untrusted code as this identity
    pub fn run_as(mut self, credentials: Option<Credentials>) -> Self {
        self.run_as = credentials;
        self
    }

    /// Copy all isolation settings from configuration
    pub fn isolation(self, isolation: &IsolationConfig) -> Self {
        self.syscall_filter(isolation.syscall_filter)
            .allow_network(isolation.allow_network)
            .run_as(isolation.run_as)
    }

    /// Build the command-line arguments
    ///
    /// Consumes self to avoid cloning the paths.
    pub fn build(self) -> Vec<String> {
        let mut args = vec![self.runner_path.to_string_lossy().into_owned()];

        args.push(format!("--mode={}", self.mode));
        args.push(format!("--workspace={}", self.workspace.display()));
        args.push(format!("--go={}", self.go_binary.display()));

        args.push(format!("--cpu-time={}", self.limits.cpu_time_limit));
        args.push(format!("--memory={}", self.limits.memory_limit));
        args.push(format!("--wall-time={}", self.limits.wall_time_limit));

        if !self.syscall_filter {
            args.push("--no-syscall-filter".to_string());
        }
        if self.allow_network {
            args.push("--allow-network".to_string());
        }
        if let Some(creds) = self.run_as {
            args.push(format!("--uid={}", creds.uid));
            args.push(format!("--gid={}", creds.gid));
        }

        args
    }

    /// Get the runner binary path
    pub fn runner_path(&self) -> &Path {
        &self.runner_path
    }

    /// Get the workspace path
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}
