//! Per-request workspace management
//!
//! Each execution gets a private `sandbox-*` directory under the configured
//! workspace root. It holds the submitted source and a `go.mod`, and is removed
//! on every exit path.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::{Credentials, ModuleName, Variant};
use crate::types::ExecutionRequest;

/// Name prefix of every workspace directory
pub const WORKSPACE_PREFIX: &str = "sandbox-";

/// Module manifest file name
pub const MANIFEST_NAME: &str = "go.mod";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace under {}: {source}", root.display())]
    Create {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {name}: {source}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("failed to start dependency resolution: {0}")]
    ResolveSpawn(#[source] std::io::Error),

    #[error("dependency resolution failed")]
    Resolve { stderr: String },

    #[error("failed to change ownership of {}: {source}", path.display())]
    Chown {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove workspace {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A private build directory owned by one request
///
/// The directory is removed by [`cleanup()`](Self::cleanup), or on drop if
/// cleanup was never called.
#[derive(Debug)]
pub struct Workspace {
    /// `None` once cleaned up
    dir: Option<TempDir>,

    path: PathBuf,
}

impl Workspace {
    /// Create an empty workspace under `root`
    #[instrument]
    pub async fn create(root: &Path) -> Result<Self, WorkspaceError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|source| WorkspaceError::Create {
                root: root.to_path_buf(),
                source,
            })?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .map_err(|source| WorkspaceError::Create {
                root: root.to_path_buf(),
                source,
            })?;
        let path = dir.path().to_path_buf();

        debug!(?path, "workspace created");

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Create a workspace holding the request's source and a module manifest
    #[instrument(skip_all, fields(mode = %request.mode(), variant = request.variant()))]
    pub async fn prepare(
        root: &Path,
        request: &ExecutionRequest,
        variant: &Variant,
        module: &ModuleName,
    ) -> Result<Self, WorkspaceError> {
        let workspace = Self::create(root).await?;
        workspace
            .write_file(request.mode().source_name(), request.source().as_bytes())
            .await?;
        workspace.ensure_manifest(&variant.manifest(module)).await?;
        Ok(workspace)
    }

    /// Get the path to the workspace directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the host path to a file inside the workspace
    ///
    /// Returns an error if the name would escape the workspace.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        if name.is_empty() || name.contains("..") || name.starts_with('/') {
            return Err(WorkspaceError::InvalidPath(format!(
                "path traversal not allowed: {name}"
            )));
        }
        Ok(self.path.join(name))
    }

    /// Write a file into the workspace, replacing any previous content
    #[instrument(skip(self, content))]
    pub async fn write_file(&self, name: &str, content: &[u8]) -> Result<(), WorkspaceError> {
        let path = self.file_path(name)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|source| WorkspaceError::Write {
                name: name.to_owned(),
                source,
            })?;
        debug!(?path, len = content.len(), "wrote file to workspace");
        Ok(())
    }

    /// Read a file from the workspace
    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>, WorkspaceError> {
        let path = self.file_path(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// Write `go.mod` unless one already exists
    ///
    /// Returns whether the manifest was written.
    #[instrument(skip(self, contents))]
    pub async fn ensure_manifest(&self, contents: &str) -> Result<bool, WorkspaceError> {
        let path = self.file_path(MANIFEST_NAME)?;
        let write_err = |source| WorkspaceError::Write {
            name: MANIFEST_NAME.to_owned(),
            source,
        };

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("manifest already present");
                return Ok(false);
            }
            Err(e) => return Err(write_err(e)),
        };

        file.write_all(contents.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        Ok(true)
    }

    /// Run `go mod tidy` in the workspace
    ///
    /// On failure the toolchain's stderr is carried in [`WorkspaceError::Resolve`].
    #[instrument(skip(self, variant, env))]
    pub async fn resolve_dependencies(
        &self,
        variant: &Variant,
        env: &[(String, String)],
    ) -> Result<(), WorkspaceError> {
        let output = Command::new(variant.go_binary())
            .args(["mod", "tidy"])
            .current_dir(&self.path)
            .env_clear()
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(WorkspaceError::ResolveSpawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            debug!(status = ?output.status, "go mod tidy failed");
            return Err(WorkspaceError::Resolve { stderr });
        }

        debug!("dependencies resolved");
        Ok(())
    }

    /// Hand the workspace tree to the unprivileged identity code runs as
    #[instrument(skip(self))]
    pub fn grant(&self, credentials: Credentials) -> Result<(), WorkspaceError> {
        chown_tree(&self.path, credentials)
    }

    /// Remove the workspace directory
    ///
    /// # Errors
    ///
    /// Returns an error if the directory could not be removed completely.
    #[must_use = "cleanup errors should be handled"]
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn cleanup(&mut self) -> Result<(), WorkspaceError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        dir.close().map_err(|source| WorkspaceError::Cleanup {
            path: self.path.clone(),
            source,
        })?;
        debug!("workspace removed");
        Ok(())
    }

    /// Check if the workspace directory is still held
    pub fn is_active(&self) -> bool {
        self.dir.is_some()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.dir.is_some() {
            debug!(
                path = %self.path.display(),
                "workspace dropped without explicit cleanup, removing"
            );
        }
    }
}

fn chown_tree(path: &Path, credentials: Credentials) -> Result<(), WorkspaceError> {
    let chown_err = |source| WorkspaceError::Chown {
        path: path.to_path_buf(),
        source,
    };

    std::os::unix::fs::lchown(path, Some(credentials.uid), Some(credentials.gid))
        .map_err(chown_err)?;

    let metadata = std::fs::symlink_metadata(path).map_err(chown_err)?;
    if metadata.is_dir() {
        for entry in std::fs::read_dir(path).map_err(chown_err)? {
            let entry = entry.map_err(chown_err)?;
            chown_tree(&entry.path(), credentials)?;
        }
    }
    Ok(())
}

/// Remove `sandbox-*` directories left behind under `root`
///
/// Returns the number of directories removed. A missing root is not an error.
#[instrument]
pub async fn sweep_workspace_root(root: &Path) -> Result<usize, WorkspaceError> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(WORKSPACE_PREFIX) {
            continue;
        }
        if !entry.file_type().await?.is_dir() {
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                debug!(?path, "removed stale workspace");
                removed += 1;
            }
            Err(e) => warn!(?path, error = %e, "failed to remove stale workspace"),
        }
    }

    Ok(removed)
}
