//! Resource usage side channel
//!
//! After a successful run the runner writes one `STATS_INFO:<seconds>;<kib>`
//! line to stderr. The orchestrator strips it from the stream and parses it.

use std::time::Duration;

use thiserror::Error;

use crate::types::ExecutionStats;

/// Marker that starts a stats line on the runner's stderr
pub const STATS_PREFIX: &str = "STATS_INFO:";

/// Error that occurs while parsing a stats line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stats line parse error: {message} (line: {line:?})")]
pub struct StatsParseError {
    /// The problematic line content
    pub line: String,
    /// Description of the error
    pub message: String,
}

impl StatsParseError {
    fn new(line: &str, message: &str) -> Self {
        Self {
            line: line.to_owned(),
            message: message.to_owned(),
        }
    }
}

impl ExecutionStats {
    /// Render the stats line (without trailing newline)
    pub fn to_line(&self) -> String {
        format!(
            "{STATS_PREFIX}{:.6};{}",
            self.wall_duration.as_secs_f64(),
            self.max_rss_kb
        )
    }

    /// Parse a stats line
    ///
    /// Returns `Ok(None)` if the line is not a stats line at all.
    pub fn parse_line(line: &str) -> Result<Option<Self>, StatsParseError> {
        let Some(rest) = line.trim_end().strip_prefix(STATS_PREFIX) else {
            return Ok(None);
        };

        let (seconds, rss) = rest
            .split_once(';')
            .ok_or_else(|| StatsParseError::new(line, "missing ';' separator"))?;

        let seconds: f64 = seconds
            .trim()
            .parse()
            .map_err(|_| StatsParseError::new(line, "invalid duration"))?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(StatsParseError::new(line, "duration out of range"));
        }

        let max_rss_kb = rss
            .trim()
            .parse()
            .map_err(|_| StatsParseError::new(line, "invalid max rss"))?;

        Ok(Some(Self {
            wall_duration: Duration::from_secs_f64(seconds),
            max_rss_kb,
        }))
    }

    /// Peak resident memory in bytes
    pub fn max_rss_bytes(&self) -> u64 {
        self.max_rss_kb.saturating_mul(1024)
    }

    /// Human-readable summary, e.g. `1.234s, 2.5 MiB`
    pub fn summary(&self) -> String {
        format!(
            "{:.3}s, {:.1} MiB",
            self.wall_duration.as_secs_f64(),
            self.max_rss_kb as f64 / 1024.0
        )
    }
}

/// Check whether a line belongs to the side channel
pub fn is_stats_line(line: &str) -> bool {
    line.starts_with(STATS_PREFIX)
}
