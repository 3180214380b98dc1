//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. Built-in defaults
//! 2. User config: `~/.config/graphtx/config.toml` (XDG) or platform config dir
//! 3. Project config: `graphtx.toml`
//! 4. Environment variables: `GRAPHTX_*`, sections separated by `__`
//!
//! ```toml
//! [executor]
//! batch_size = 500
//! max_retries = 3
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! `GRAPHTX_EXECUTOR__BATCH_SIZE=250` overrides `executor.batch_size`.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default number of units of work per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Project config file looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "graphtx.toml";

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Batch executor tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Units of work per transaction. Must be at least 1.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// How many times a batch is re-run after a transient store failure.
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: 0,
        }
    }
}

/// Logging configuration for the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive (e.g. "info", "graphtx=trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load config with layered resolution (defaults → user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(PROJECT_CONFIG_FILE))
    }

    /// Same as [`Config::load`] with an explicit project config file.
    pub fn load_from(project_file: &Path) -> Result<Self, ConfigError> {
        Self::from_figment(Self::layered(&Self::user_config_path(), project_file))
    }

    fn layered(user_file: &Path, project_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(user_file))
            .merge(Toml::file(project_file))
            .merge(Env::prefixed("GRAPHTX_").split("__"))
    }

    /// Extracts a config from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(ConfigError::from)
    }

    /// User config path: ~/.config/graphtx/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("graphtx").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        dirs::config_dir()
            .map(|p| p.join("graphtx").join("config.toml"))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_graphtx_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with("GRAPHTX_") {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::from_figment(Figment::from(Toml::string(""))).unwrap();
        assert_eq!(config.executor.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.executor.max_retries, 0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_section() {
        let toml = r#"
            [executor]
            max_retries = 2
        "#;
        let config = Config::from_figment(Figment::from(Toml::string(toml))).unwrap();
        assert_eq!(config.executor.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.executor.max_retries, 2);
    }

    #[test]
    fn test_invalid_type_is_an_error() {
        let toml = r#"
            [executor]
            batch_size = "lots"
        "#;
        assert!(Config::from_figment(Figment::from(Toml::string(toml))).is_err());
    }

    #[test]
    #[serial]
    fn test_project_file_and_env_layering() {
        let dir = tempfile::tempdir().unwrap();
        let mut user = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        writeln!(user, "[executor]\nbatch_size = 10\n\n[logging]\nlevel = \"warn\"").unwrap();
        let mut project = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        writeln!(project, "[executor]\nbatch_size = 50\nmax_retries = 1\n").unwrap();

        clear_graphtx_env();
        std::env::set_var("GRAPHTX_EXECUTOR__MAX_RETRIES", "4");
        let config = Config::from_figment(Config::layered(user.path(), project.path()));
        std::env::remove_var("GRAPHTX_EXECUTOR__MAX_RETRIES");

        let config = config.unwrap();
        assert_eq!(config.executor.batch_size, 50);
        assert_eq!(config.executor.max_retries, 4);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    #[serial]
    fn test_missing_project_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        clear_graphtx_env();

        let user = dir.path().join("user.toml");
        let figment = Config::layered(&user, &dir.path().join("absent.toml"));
        let config = Config::from_figment(figment).unwrap();

        assert_eq!(config.executor, ExecutorConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
    }
}
