//! goplay sandbox runner
//!
//! Spawned once per request by the orchestrator. Builds (or tests) the
//! workspace, runs the result under isolation and reports through its exit
//! code and a final stats line on stderr.
//!
//! Exit codes: 0 success, 124 timeout, 125 sandbox setup failure, 126 build
//! failure, anything else is the program's own status.

use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use goplay::runner::{self, RunSpec};
use goplay::{Credentials, Mode, ResourceLimits, SETUP_FAILED_EXIT_CODE};
use tracing::{Level, debug};
use tracing_subscriber::EnvFilter;

/// Set to enable runner logging; stderr is otherwise reserved for the program
const LOG_ENV: &str = "GOPLAY_RUNNER_LOG";

#[derive(Parser, Debug)]
#[command(name = "goplay-runner")]
#[command(about = "Build and run one Go submission inside the sandbox")]
#[command(version)]
struct Cli {
    /// Toolchain flow
    #[arg(long, default_value = "program")]
    mode: Mode,

    /// Workspace holding the source and go.mod
    #[arg(long)]
    workspace: PathBuf,

    /// Path to the `go` binary
    #[arg(long)]
    go: PathBuf,

    /// CPU time limit in seconds
    #[arg(long, default_value_t = 6)]
    cpu_time: u64,

    /// Address space limit in bytes
    #[arg(long, default_value_t = ResourceLimits::GB)]
    memory: u64,

    /// Wall clock limit of the execute step in seconds
    #[arg(long, default_value_t = 5.0)]
    wall_time: f64,

    /// Skip the seccomp filter
    #[arg(long)]
    no_syscall_filter: bool,

    /// Allow listening sockets
    #[arg(long)]
    allow_network: bool,

    /// Run untrusted code as this uid
    #[arg(long, requires = "gid")]
    uid: Option<u32>,

    /// Run untrusted code as this gid
    #[arg(long, requires = "uid")]
    gid: Option<u32>,
}

impl Cli {
    fn into_spec(self) -> RunSpec {
        let run_as = match (self.uid, self.gid) {
            (Some(uid), Some(gid)) => Some(Credentials { uid, gid }),
            _ => None,
        };
        RunSpec {
            mode: self.mode,
            workspace: self.workspace,
            go_binary: self.go,
            limits: ResourceLimits::new()
                .with_cpu_time_limit(self.cpu_time)
                .with_memory_limit(self.memory)
                .with_wall_time_limit(self.wall_time),
            syscall_filter: !self.no_syscall_filter,
            allow_network: self.allow_network,
            run_as,
        }
    }
}

fn init_logging() {
    let Some(directive) = std::env::var_os(LOG_ENV) else {
        return;
    };
    let filter = match directive.to_str() {
        Some(directive) if !directive.is_empty() => EnvFilter::new(directive),
        _ => EnvFilter::default().add_directive(Level::DEBUG.into()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();
    debug!(?cli, "runner started");

    let spec = cli.into_spec();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{} Sandbox error: {e}", Local::now().format("%Y/%m/%d %H:%M:%S"));
            std::process::exit(SETUP_FAILED_EXIT_CODE);
        }
    };

    let code = match runtime.block_on(runner::run(&spec)) {
        Ok(stats) => {
            debug!(usage = %stats.summary(), "run completed");
            eprintln!("{}", stats.to_line());
            0
        }
        Err(e) => {
            debug!(error = %e, "run failed");
            if let Some(line) = e.failure_line(Local::now()) {
                eprintln!("{line}");
            }
            e.exit_code()
        }
    };

    drop(runtime);
    std::process::exit(code);
}
