//! Source formatting through the variant's `gofmt`

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::Variant;

/// `gofmt`'s name for source read from stdin
const STDIN_NAME: &str = "<standard input>";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to start gofmt: {0}")]
    Spawn(#[source] std::io::Error),

    /// The source does not parse; carries gofmt's diagnostics
    #[error("{0}")]
    Syntax(String),

    #[error("formatting timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Format Go source text
///
/// Runs `gofmt` with the source on stdin and an empty environment apart
/// from PATH. The process is killed if it outlives `timeout`.
#[instrument(skip(variant, source), fields(gofmt = %variant.gofmt_binary().display(), len = source.len()))]
pub async fn format_source(
    variant: &Variant,
    source: &str,
    timeout: Duration,
) -> Result<String, FormatError> {
    let mut child = Command::new(variant.gofmt_binary())
        .env_clear()
        .env("PATH", variant.search_path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(FormatError::Spawn)?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| FormatError::Io(std::io::Error::other("gofmt stdin not piped")))?;
    let input = source.as_bytes().to_vec();
    let writer = tokio::spawn(async move {
        stdin.write_all(&input).await?;
        stdin.shutdown().await
    });

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| FormatError::Timeout)??;

    // gofmt may exit on a parse error before reading everything
    if let Ok(Err(e)) = writer.await {
        debug!(error = %e, "gofmt closed stdin early");
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = stderr
            .lines()
            .map(|line| line.strip_prefix(STDIN_NAME).map_or(line, |rest| rest.trim_start_matches(':')))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(FormatError::Syntax(message));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
