use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::runner::{RunSpec, RunnerError, status_code};

/// Name of the executable produced by the build step
pub const ARTIFACT_NAME: &str = "main";

/// Create the private directory the artifact is written to
///
/// It lives outside the workspace so the guest never sees the binary next to
/// its source. When the run drops privileges the directory is handed to the
/// target identity so the artifact stays reachable after the switch.
pub fn build_dir(spec: &RunSpec) -> Result<TempDir, RunnerError> {
    let dir = tempfile::Builder::new()
        .prefix("goplay-build-")
        .tempdir()
        .map_err(|e| RunnerError::Workspace(format!("failed to create build directory: {e}")))?;

    if let Some(creds) = spec.run_as {
        std::os::unix::fs::chown(dir.path(), Some(creds.uid), Some(creds.gid)).map_err(|e| {
            RunnerError::Workspace(format!(
                "failed to chown {}: {e}",
                dir.path().display()
            ))
        })?;
    }

    Ok(dir)
}

/// Compile the workspace into `out_dir`
///
/// The toolchain's diagnostics go straight to the runner's stderr. No syscall
/// policy applies here; the build is bounded by the caller's request timeout.
#[instrument(skip(spec), fields(go = %spec.go_binary.display()))]
pub async fn build(spec: &RunSpec, out_dir: &Path) -> Result<PathBuf, RunnerError> {
    let artifact = out_dir.join(ARTIFACT_NAME);

    let status = Command::new(&spec.go_binary)
        .arg("build")
        .arg("-o")
        .arg(&artifact)
        .arg(".")
        .current_dir(&spec.workspace)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(RunnerError::Toolchain)?;

    debug!(?status, "build finished");

    if !status.success() {
        return Err(RunnerError::Build {
            status: status_code(status),
        });
    }

    Ok(artifact)
}
