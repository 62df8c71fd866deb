use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::runner::{RunSpec, RunnerError, status_code};
use crate::sandbox::{Isolation, IsolationError, cpu_seconds, reap_with_usage, wait_exited};
use crate::types::ExecutionStats;

/// Run the built artifact under isolation
///
/// stdout and stderr are inherited, so the program writes straight into the
/// runner's pipes.
#[instrument(skip(spec, isolation), fields(artifact = %artifact.display()))]
pub async fn execute(
    spec: &RunSpec,
    artifact: &Path,
    isolation: &Isolation,
) -> Result<ExecutionStats, RunnerError> {
    let command = Command::new(artifact);
    run_isolated(command, spec, isolation).await
}

/// Hand the package to `go test -v` under isolation
#[instrument(skip(spec, isolation), fields(go = %spec.go_binary.display()))]
pub async fn run_tests(spec: &RunSpec, isolation: &Isolation) -> Result<ExecutionStats, RunnerError> {
    let mut command = Command::new(&spec.go_binary);
    command.args(["test", "-v", "."]);
    run_isolated(command, spec, isolation).await
}

async fn run_isolated(
    mut command: Command,
    spec: &RunSpec,
    isolation: &Isolation,
) -> Result<ExecutionStats, RunnerError> {
    // The child is reaped here with wait4, not by tokio
    command
        .current_dir(&spec.workspace)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(false);
    isolation.install(&mut command);

    let started = Instant::now();

    // A failing pre-exec step surfaces here as a spawn error
    let child = command.spawn().map_err(IsolationError::SpawnFailed)?;
    let pid = child
        .id()
        .ok_or_else(|| IsolationError::Io(io::Error::other("child has no pid")))?
        as libc::pid_t;

    let mut exited = tokio::task::spawn_blocking(move || wait_exited(pid));
    let timed_out = match tokio::time::timeout(spec.limits.wall_time(), &mut exited).await {
        Ok(joined) => {
            joined
                .map_err(|e| IsolationError::Io(io::Error::other(e)))?
                .map_err(IsolationError::Io)?;
            false
        }
        Err(_) => {
            debug!(limit = spec.limits.wall_time_limit, "wall clock limit reached");
            // SAFETY: the child is not reaped yet, so `pid` still names it
            if unsafe { libc::kill(pid, libc::SIGKILL) } != 0 {
                warn!(error = %io::Error::last_os_error(), "failed to kill timed out process");
            }
            exited
                .await
                .map_err(|e| IsolationError::Io(io::Error::other(e)))?
                .map_err(IsolationError::Io)?;
            true
        }
    };

    let wall_duration = started.elapsed();
    let (raw_status, usage) = reap_with_usage(pid).map_err(IsolationError::Io)?;
    drop(child);

    if timed_out {
        return Err(RunnerError::Timeout);
    }

    let status = ExitStatus::from_raw(raw_status);
    let cpu_used = cpu_seconds(&usage);
    debug!(?status, cpu_used, elapsed = ?wall_duration, max_rss_kb = usage.ru_maxrss, "process finished");

    classify(status, cpu_used, spec.limits.cpu_time_limit)?;

    Ok(ExecutionStats {
        wall_duration,
        max_rss_kb: u64::try_from(usage.ru_maxrss).unwrap_or(0),
    })
}

/// Map a finished process to success, timeout or failure
///
/// The CPU limit ends a process with SIGXCPU at the soft limit, or SIGKILL
/// at the hard limit; both count as a timeout.
fn classify(status: ExitStatus, cpu_used: f64, cpu_limit: u64) -> Result<(), RunnerError> {
    if status.success() {
        return Ok(());
    }

    match status.signal() {
        Some(libc::SIGXCPU) => Err(RunnerError::Timeout),
        Some(libc::SIGKILL) if cpu_used >= cpu_limit as f64 => Err(RunnerError::Timeout),
        _ => Err(RunnerError::Execution {
            status: status_code(status),
        }),
    }
}
