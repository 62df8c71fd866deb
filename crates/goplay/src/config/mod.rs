use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::variant::{ModuleName, Variant};
use crate::types::ResourceLimits;

mod loader;
pub mod variant;

/// Example configuration embedded at compile time.
///
/// Also serves as the default configuration.
pub const EXAMPLE_CONFIG: &str = include_str!("../../goplay.example.toml");

/// Prefix for environment overrides (`GOPLAY__LIMITS__CPU_TIME_LIMIT=4`)
pub const ENV_PREFIX: &str = "GOPLAY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid module name '{0}'")]
    InvalidModuleName(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("variant '{0}' not found in configuration")]
    VariantNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for goplay
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Parent directory of the per-request workspaces
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Path to the sandbox runner binary (uses PATH if not specified)
    #[serde(default)]
    pub runner_path: Option<PathBuf>,

    /// Module path written to every workspace's go.mod
    #[serde(default)]
    pub module_name: ModuleName,

    /// Variant used when a request leaves `version` empty
    pub default_variant: String,

    /// Orchestrator watchdog in seconds, covering the whole runner lifetime
    #[serde(default = "default_request_timeout")]
    pub request_timeout: f64,

    /// Maximum number of executions in flight at once
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// Limits applied to every untrusted process
    #[serde(default)]
    pub limits: ResourceLimits,

    #[serde(default)]
    pub isolation: IsolationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Toolchain variants keyed by the `version` clients send
    #[serde(default)]
    pub variants: HashMap<String, Variant>,
}

/// How untrusted processes are confined
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IsolationConfig {
    /// Load the seccomp filter before exec
    #[serde(default = "default_true")]
    pub syscall_filter: bool,

    /// Allow the socket/bind/listen/accept group
    #[serde(default = "default_true")]
    pub allow_network: bool,

    /// Identity to switch to before exec
    #[serde(default)]
    pub run_as: Option<Credentials>,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            syscall_filter: true,
            allow_network: true,
            run_as: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Config {
    /// Create a new config from the embedded example
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with a single variant and defaults everywhere else
    pub fn with_variant(id: &str, variant: Variant) -> Self {
        Self {
            workspace_root: default_workspace_root(),
            runner_path: None,
            module_name: ModuleName::default(),
            default_variant: id.to_owned(),
            request_timeout: default_request_timeout(),
            max_concurrent: None,
            limits: ResourceLimits::default(),
            isolation: IsolationConfig::default(),
            server: ServerConfig::default(),
            variants: HashMap::from([(id.to_owned(), variant)]),
        }
    }

    /// Get a variant by ID
    pub fn get_variant(&self, id: &str) -> Result<&Variant, ConfigError> {
        self.variants
            .get(id)
            .ok_or_else(|| ConfigError::VariantNotFound(id.to_owned()))
    }

    /// Map a client `version` to a variant ID, falling back to the default
    pub fn resolve_variant<'a>(&'a self, version: &'a str) -> Result<&'a str, ConfigError> {
        let id = if version.is_empty() {
            self.default_variant.as_str()
        } else {
            version
        };
        self.get_variant(id)?;
        Ok(id)
    }

    /// Get the path to the runner binary
    pub fn runner_binary(&self) -> PathBuf {
        self.runner_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("goplay-runner"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout.max(0.0))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("goplay")
}

fn default_request_timeout() -> f64 {
    10.0
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_true() -> bool {
    true
}
