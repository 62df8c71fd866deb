use std::borrow::Cow;
use std::path::Path;

use regex::Regex;

use crate::config::ModuleName;
use crate::workspace::WORKSPACE_PREFIX;

/// Wrapper log lines the runner prints when a step fails
const FAILURE_LINE_PATTERN: &str =
    r"^[0-9]{4}/[0-9]{2}/[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2} (Build|Execution) error: exit status [0-9]+";

/// Strips toolchain noise and host paths from stderr lines
///
/// Skip rules run first; a line that survives them is redacted.
#[derive(Debug, Clone)]
pub struct OutputFilter {
    skip: Vec<Regex>,
    workspace: Regex,
}

impl OutputFilter {
    pub fn new(workspace_root: &Path, module: &ModuleName) -> Result<Self, regex::Error> {
        let banner = format!(
            r"^# (command-line-arguments|{})(\s|$)",
            regex::escape(module.as_str())
        );
        let root = workspace_root.to_string_lossy();
        let root = root.trim_end_matches('/');
        let workspace = format!(
            "{}/{}[^/]+/",
            regex::escape(root),
            regex::escape(WORKSPACE_PREFIX)
        );

        Ok(Self {
            skip: vec![Regex::new(&banner)?, Regex::new(FAILURE_LINE_PATTERN)?],
            workspace: Regex::new(&workspace)?,
        })
    }

    /// Whether the line is dropped entirely
    pub fn should_skip(&self, line: &str) -> bool {
        self.skip.iter().any(|re| re.is_match(line))
    }

    /// Remove absolute workspace paths, leaving the file name
    pub fn redact<'a>(&self, line: &'a str) -> Cow<'a, str> {
        self.workspace.replace_all(line, "")
    }

    /// Skip, then redact
    pub fn apply(&self, line: &str) -> Option<String> {
        if self.should_skip(line) {
            return None;
        }
        Some(self.redact(line).into_owned())
    }
}
