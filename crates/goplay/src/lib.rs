//! A library for sandboxed Go execution.
//!
//! goplay turns a Go source submission into an isolated, resource-bounded
//! process and streams its output back as events while it runs.
//!
//! # Features
//!
//! - **Workspaces**: One private temporary directory per request, removed on every exit path.
//! - **Isolation**: seccomp syscall policy, CPU and address-space rlimits, optional privilege drop.
//! - **Sandbox runner**: Builds (or tests) the workspace and executes the artifact under a wall-clock limit.
//! - **Streaming orchestrator**: Frames runner output into `stdout`/`stderr`/`clear` events, ending in one terminal event.
//! - **Toolchain variants**: Several pre-provisioned Go installations selected per request.
//! - **TOML configuration**: Embedded defaults with file and environment overrides.

pub use config::{Config, ConfigError, Credentials, EXAMPLE_CONFIG, ModuleName, Variant};
pub use format::{FormatError, format_source};
pub use orchestrator::{
    EventKind, EventStream, Orchestrator, OrchestratorError, OutputEvent, OutputFilter,
};
pub use runner::{RunSpec, RunnerError};
pub use sandbox::{Isolation, IsolationError, SyscallPolicy};
pub use types::{
    BUILD_FAILED_EXIT_CODE, ExecutionRequest, ExecutionStats, Mode, ResourceLimits, RunStatus,
    SETUP_FAILED_EXIT_CODE, TIMEOUT_EXIT_CODE,
};
pub use workspace::{Workspace, WorkspaceError, sweep_workspace_root};

pub mod config;
pub mod format;
pub mod orchestrator;
pub mod runner;
pub mod sandbox;
pub mod types;
pub mod workspace;
