//! User configuration loaded from `~/.config/witr/config.toml`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ancestry::DEFAULT_MAX_DEPTH;

const CONFIG_ENV: &str = "WITR_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum number of processes in an ancestry chain.
    pub max_depth: usize,
    /// Colourise output unless `--no-color` is given.
    pub color: bool,
    pub classifier: ClassifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            color: true,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Extra classification rules, appended after the built-in ones.
/// Patterns are regular expressions matched against the process command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    pub runtimes: Vec<RuntimePattern>,
    pub containers: Vec<String>,
    pub supervisors: Vec<String>,
    pub shells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePattern {
    pub pattern: String,
    pub label: String,
}

/// Default config location, e.g. `~/.config/witr/config.toml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("witr").join("config.toml"))
}

impl Config {
    /// Load from `explicit`, else `$WITR_CONFIG`, else the default path.
    ///
    /// A missing default file yields the defaults; a missing file that was
    /// asked for by name is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }

        match default_path() {
            Some(path) => match fs::read_to_string(&path) {
                Ok(content) => Self::parse(&content)
                    .with_context(|| format!("Invalid config file {}", path.display())),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
                Err(err) => Err(err)
                    .with_context(|| format!("Failed to read config file {}", path.display())),
            },
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config TOML")?;
        if config.max_depth == 0 {
            anyhow::bail!("max_depth must be at least 1");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
max_depth = 16
color = false

[classifier]
runtimes = [{ pattern = "^uwsgi$", label = "uwsgi" }]
supervisors = ["^my-supervisor$"]
shells = ["^xonsh$"]
"#,
        )
        .unwrap();

        assert_eq!(config.max_depth, 16);
        assert!(!config.color);
        assert_eq!(config.classifier.runtimes[0].label, "uwsgi");
        assert_eq!(config.classifier.supervisors, vec!["^my-supervisor$"]);
        assert!(config.classifier.containers.is_empty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::parse("max_dept = 3").is_err());
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert!(Config::parse("max_depth = 0").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config file"));
    }

    #[test]
    fn test_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("witr.toml");
        fs::write(&path, "max_depth = 3\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().max_depth, 3);
    }
}
