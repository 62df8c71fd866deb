//! Runner process handle
//!
//! Spawns the runner as the leader of a new process group with piped
//! stdout/stderr, so that the runner, the toolchain and the artifact can be
//! killed together.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, instrument, warn};

use crate::sandbox::IsolationError;

/// Idempotent kill switch for a process group
///
/// Cloned into every task that may need to tear the runner down.
#[derive(Debug, Clone)]
pub struct ProcessKiller {
    inner: Arc<KillerState>,
}

#[derive(Debug)]
struct KillerState {
    pgid: libc::pid_t,
    killed: AtomicBool,
    reaped: AtomicBool,
}

impl ProcessKiller {
    pub fn new(pgid: libc::pid_t) -> Self {
        Self {
            inner: Arc::new(KillerState {
                pgid,
                killed: AtomicBool::new(false),
                reaped: AtomicBool::new(false),
            }),
        }
    }

    /// SIGKILL the whole group
    ///
    /// Returns `true` only for the call that sent the signal. Later calls, and
    /// calls after the leader was reaped, send nothing and return `false`;
    /// either way the killer counts as killed afterwards.
    pub fn kill(&self) -> bool {
        if self.inner.killed.swap(true, Ordering::SeqCst) {
            return false;
        }
        if self.inner.reaped.load(Ordering::SeqCst) {
            debug!(pgid = self.inner.pgid, "process group already reaped");
            return false;
        }
        debug!(pgid = self.inner.pgid, "killing process group");
        self.signal_group();
        true
    }

    /// Whether [`kill`](Self::kill) has been called
    pub fn is_killed(&self) -> bool {
        self.inner.killed.load(Ordering::SeqCst)
    }

    /// SIGKILL whatever is left in the group without recording a kill
    fn sweep(&self) {
        self.signal_group();
    }

    fn mark_reaped(&self) {
        self.inner.reaped.store(true, Ordering::SeqCst);
    }

    fn signal_group(&self) {
        // Once the leader is reaped its id may be reused
        if self.inner.reaped.load(Ordering::SeqCst) {
            return;
        }
        // SAFETY: plain integer arguments; a negative pid addresses the group
        if unsafe { libc::kill(-self.inner.pgid, libc::SIGKILL) } != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                warn!(pgid = self.inner.pgid, error = %err, "failed to kill process group");
            }
        }
    }
}

/// A running runner process
#[derive(Debug)]
pub struct SandboxProcess {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    killer: ProcessKiller,
}

impl SandboxProcess {
    /// Spawn `args` with a cleared environment set to `env`
    #[instrument(skip(env))]
    pub fn spawn(
        args: &[String],
        env: &[(String, String)],
        cwd: &Path,
    ) -> Result<Self, IsolationError> {
        let (program, rest) = args.split_first().ok_or_else(|| {
            IsolationError::SpawnFailed(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command arguments",
            ))
        })?;

        let mut child = Command::new(program)
            .args(rest)
            .current_dir(cwd)
            .env_clear()
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(IsolationError::SpawnFailed)?;

        let pid = child.id().ok_or_else(|| {
            IsolationError::SpawnFailed(std::io::Error::other("process exited before its id was read"))
        })?;
        let pgid = libc::pid_t::try_from(pid).map_err(|_| {
            IsolationError::SpawnFailed(std::io::Error::other(format!("pid {pid} out of range")))
        })?;

        debug!(pid, "spawned runner");

        Ok(Self {
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            killer: ProcessKiller::new(pgid),
        })
    }

    /// Get a kill switch for the process group
    pub fn killer(&self) -> ProcessKiller {
        self.killer.clone()
    }

    /// Take ownership of stdout
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Take ownership of stderr
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// Wait for the runner to exit
    ///
    /// Whatever is still alive in the group once the runner is gone (an
    /// orphaned test binary, a detached grandchild) is killed, so the output
    /// pipes reach EOF.
    pub async fn wait(&mut self) -> Result<ExitStatus, IsolationError> {
        let status = self.child.wait().await?;
        // The group id stays allocated while members remain
        self.killer.sweep();
        self.killer.mark_reaped();
        debug!(?status, "runner exited");
        Ok(status)
    }

    /// Kill the process group
    pub fn kill(&self) -> bool {
        self.killer.kill()
    }
}

impl Drop for SandboxProcess {
    fn drop(&mut self) {
        self.killer.sweep();
    }
}
