use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exit code the runner uses when the program hit the wall-clock or CPU limit
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code the runner uses when the sandbox could not be set up
pub const SETUP_FAILED_EXIT_CODE: i32 = 125;

/// Exit code the runner uses when the build step failed
pub const BUILD_FAILED_EXIT_CODE: i32 = 126;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU time limit in seconds (RLIMIT_CPU)
    #[serde(default = "default_cpu_time_limit")]
    pub cpu_time_limit: u64,

    /// Address space limit in bytes (RLIMIT_AS)
    #[serde(default = "default_memory_limit")]
    pub memory_limit: u64,

    /// Wall clock time limit for the execute step in seconds
    #[serde(default = "default_wall_time_limit")]
    pub wall_time_limit: f64,
}

impl ResourceLimits {
    /// 1 kilobyte in bytes
    pub const KB: u64 = 1024;
    /// 1 megabyte in bytes
    pub const MB: u64 = 1024 * 1024;
    /// 1 gigabyte in bytes
    pub const GB: u64 = 1024 * 1024 * 1024;

    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CPU time limit in seconds
    pub fn with_cpu_time_limit(mut self, seconds: u64) -> Self {
        self.cpu_time_limit = seconds;
        self
    }

    /// Set the address space limit in bytes
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Set the wall clock time limit in seconds
    pub fn with_wall_time_limit(mut self, seconds: f64) -> Self {
        self.wall_time_limit = seconds;
        self
    }

    pub fn wall_time(&self) -> Duration {
        Duration::from_secs_f64(self.wall_time_limit.max(0.0))
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_time_limit: default_cpu_time_limit(),
            memory_limit: default_memory_limit(),
            wall_time_limit: default_wall_time_limit(),
        }
    }
}

fn default_cpu_time_limit() -> u64 {
    6
}

fn default_memory_limit() -> u64 {
    ResourceLimits::GB
}

fn default_wall_time_limit() -> f64 {
    5.0
}

/// Which toolchain flow a submission goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Build an executable and run it
    #[default]
    Program,
    /// Hand the package to the toolchain's test runner
    Test,
}

impl Mode {
    /// Guess the mode from the source text.
    ///
    /// This is a plain substring scan: `func main(` anywhere in the text (even
    /// inside a comment or a string literal) selects [`Mode::Program`]. Callers
    /// that know better should pass an explicit mode instead.
    pub fn detect(source: &str) -> Self {
        if source.contains("func main(") {
            return Mode::Program;
        }
        if source.contains("func Test") || source.contains("func Benchmark") {
            return Mode::Test;
        }
        Mode::Program
    }

    /// File name the submission is written to
    pub fn source_name(&self) -> &'static str {
        match self {
            Mode::Program => "main.go",
            Mode::Test => "main_test.go",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Program => "program",
            Mode::Test => "test",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "program" => Ok(Mode::Program),
            "test" => Ok(Mode::Test),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// A single submission, fixed at creation
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    source: String,
    variant: String,
    mode: Mode,
}

impl ExecutionRequest {
    /// Create a request, classifying the mode from the source
    pub fn new(source: impl Into<String>, variant: impl Into<String>) -> Self {
        let source = source.into();
        let mode = Mode::detect(&source);
        Self {
            source,
            variant: variant.into(),
            mode,
        }
    }

    /// Override the detected mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

/// Resource usage of a successful run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionStats {
    /// Wall clock duration of the execute step
    pub wall_duration: Duration,

    /// Peak resident set size in kilobytes
    pub max_rss_kb: u64,
}

/// Outcome of a runner process, decoded from its exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Program ran to completion
    Completed,

    /// Wall clock or CPU time limit exceeded
    TimedOut,

    /// The build (or test compile) failed
    BuildFailed,

    /// Workspace, isolation or spawn failure inside the runner
    SetupFailed,

    /// Program exited with a non-zero status
    Failed(i32),

    /// The runner itself was killed by a signal
    Signaled(i32),
}

impl RunStatus {
    /// Decode the runner's exit code (or terminating signal)
    pub fn from_exit(code: Option<i32>, signal: Option<i32>) -> Self {
        match (code, signal) {
            (Some(0), _) => RunStatus::Completed,
            (Some(TIMEOUT_EXIT_CODE), _) => RunStatus::TimedOut,
            (Some(BUILD_FAILED_EXIT_CODE), _) => RunStatus::BuildFailed,
            (Some(SETUP_FAILED_EXIT_CODE), _) => RunStatus::SetupFailed,
            (Some(code), _) => RunStatus::Failed(code),
            (None, Some(signal)) => RunStatus::Signaled(signal),
            (None, None) => RunStatus::Failed(1),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}
