use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;

/// A pre-provisioned Go toolchain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Human-readable name (e.g., "Go 1.22")
    pub name: String,

    /// Toolchain root; `bin/go` and `bin/gofmt` live beneath it
    pub root: PathBuf,

    /// Language version written to the `go` directive of go.mod
    #[serde(default = "default_go_version")]
    pub go_version: String,

    /// Run `go mod tidy` after writing the source
    #[serde(default)]
    pub resolve_dependencies: bool,

    /// Extra environment variables for the toolchain and the program
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Variant {
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn go_binary(&self) -> PathBuf {
        self.bin_dir().join("go")
    }

    pub fn gofmt_binary(&self) -> PathBuf {
        self.bin_dir().join("gofmt")
    }

    /// Contents of the go.mod written into fresh workspaces
    pub fn manifest(&self, module: &ModuleName) -> String {
        format!("module {module}\n\ngo {}\n", self.go_version)
    }

    /// PATH for the runner: the toolchain first, then the usual system dirs
    pub fn search_path(&self) -> String {
        format!("{}:/usr/local/bin:/usr/bin:/bin", self.bin_dir().display())
    }

    /// Environment for toolchain and runner processes, which start from an
    /// empty environment
    ///
    /// Variant `env` entries override the computed `GOCACHE`.
    pub fn environment(&self, home: &Path) -> Vec<(String, String)> {
        let mut env = vec![
            ("PATH".to_owned(), self.search_path()),
            ("HOME".to_owned(), home.display().to_string()),
            (
                "GOCACHE".to_owned(),
                home.join(".cache").join("go-build").display().to_string(),
            ),
        ];
        for (key, value) in &self.env {
            match env.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.clone(),
                None => env.push((key.clone(), value.clone())),
            }
        }
        env
    }
}

fn default_go_version() -> String {
    "1.22".to_owned()
}

/// Module path used in go.mod, also matched by the build banner filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleName(String);

impl ModuleName {
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/'));
        if !valid {
            return Err(ConfigError::InvalidModuleName(name.to_owned()));
        }
        Ok(Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModuleName {
    fn default() -> Self {
        Self("sandbox".to_owned())
    }
}

impl<'de> Deserialize<'de> for ModuleName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ModuleName::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a module path of letters, digits, '.', '-', '_' or '/'",
            )
        })
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn module_name_accepts_path_like(s in "[a-zA-Z0-9._/-]+") {
            prop_assert!(ModuleName::new(&s).is_ok());
        }

        #[test]
        fn module_name_rejects_any_whitespace(a in "[a-z]*", b in "[a-z]*") {
            let s = format!("{a} {b}");
            prop_assert!(ModuleName::new(&s).is_err());
        }
    }
}
