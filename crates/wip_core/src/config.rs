//! Runtime configuration for one WIP invocation.
//!
//! # Responsibility
//! - Resolve the state directory, storage backend, editor and log level.
//! - Apply precedence: explicit overrides, then environment, then defaults.
//!
//! # Invariants
//! - `state_dir` is always absolute, independent of the working directory
//!   the tracker was started from.

use crate::logging::{default_log_level, normalize_level};
use crate::repo::json_state_repo::STATE_DOCUMENT_NAME;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const STATE_DIR_ENV: &str = "WIP_HOME";
pub const BACKEND_ENV: &str = "WIP_BACKEND";
pub const LOG_LEVEL_ENV: &str = "WIP_LOG";
pub const EDITOR_ENV: &str = "EDITOR";
pub const DEFAULT_EDITOR: &str = "vi";

const DEFAULT_STATE_DIR_NAME: &str = ".wip";
const STATE_DB_FILE_NAME: &str = "wip.sqlite3";
const LOG_DIR_NAME: &str = "logs";

/// Configuration failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither an explicit state directory nor `HOME` is available.
    MissingHome,
    /// The working directory is needed to absolutize a relative path.
    CurrentDirUnavailable(String),
    UnsupportedBackend(String),
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHome => write!(
                f,
                "cannot locate state directory: set {STATE_DIR_ENV} or HOME"
            ),
            Self::CurrentDirUnavailable(message) => {
                write!(f, "cannot resolve relative state directory: {message}")
            }
            Self::UnsupportedBackend(value) => {
                write!(f, "unsupported backend `{value}`; expected sqlite|json")
            }
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {}

/// Storage engine used for the state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Json,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Values supplied explicitly by the caller, typically CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub state_dir: Option<PathBuf>,
    pub backend: Option<StorageBackend>,
    pub log_level: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipConfig {
    pub state_dir: PathBuf,
    pub backend: StorageBackend,
    pub editor: String,
    pub log_level: &'static str,
}

impl WipConfig {
    /// Resolves configuration from overrides and the process environment.
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::from_sources(overrides, |key| std::env::var(key).ok())
    }

    /// Resolves configuration reading variables through `env`.
    pub fn from_sources(
        overrides: ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let state_dir = match overrides.state_dir.or_else(|| env(STATE_DIR_ENV).map(PathBuf::from)) {
            Some(dir) => dir,
            None => env("HOME")
                .map(|home| Path::new(&home).join(DEFAULT_STATE_DIR_NAME))
                .ok_or(ConfigError::MissingHome)?,
        };
        let state_dir = absolutize(state_dir)?;

        let backend = match overrides.backend {
            Some(backend) => backend,
            None => match env(BACKEND_ENV) {
                Some(value) => value.parse()?,
                None => StorageBackend::default(),
            },
        };

        let log_level = match overrides.log_level.or_else(|| env(LOG_LEVEL_ENV)) {
            Some(level) => normalize_level(&level).map_err(ConfigError::InvalidLogLevel)?,
            None => default_log_level(),
        };

        let editor = env(EDITOR_ENV).unwrap_or_else(|| DEFAULT_EDITOR.to_string());

        Ok(Self {
            state_dir,
            backend,
            editor,
            log_level,
        })
    }

    /// SQLite state file location.
    pub fn state_db_path(&self) -> PathBuf {
        self.state_dir.join(STATE_DB_FILE_NAME)
    }

    /// JSON state document location.
    pub fn state_document_path(&self) -> PathBuf {
        self.state_dir.join(STATE_DOCUMENT_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join(LOG_DIR_NAME)
    }
}

fn absolutize(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir()
        .map_err(|err| ConfigError::CurrentDirUnavailable(err.to_string()))?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ConfigOverrides, StorageBackend, WipConfig};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_home_dot_wip_sqlite_and_vi() {
        let config =
            WipConfig::from_sources(ConfigOverrides::default(), env_from(&[("HOME", "/home/u")]))
                .unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/home/u/.wip"));
        assert_eq!(config.backend, StorageBackend::Sqlite);
        assert_eq!(config.editor, "vi");
        assert_eq!(config.state_db_path(), PathBuf::from("/home/u/.wip/wip.sqlite3"));
        assert_eq!(config.log_dir(), PathBuf::from("/home/u/.wip/logs"));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = WipConfig::from_sources(
            ConfigOverrides::default(),
            env_from(&[
                ("HOME", "/home/u"),
                ("WIP_HOME", "/srv/wip"),
                ("WIP_BACKEND", "JSON"),
                ("WIP_LOG", "warning"),
                ("EDITOR", "nano"),
            ]),
        )
        .unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/srv/wip"));
        assert_eq!(config.backend, StorageBackend::Json);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.editor, "nano");
        assert_eq!(config.state_document_path(), PathBuf::from("/srv/wip/state.json"));
    }

    #[test]
    fn explicit_overrides_beat_environment() {
        let overrides = ConfigOverrides {
            state_dir: Some(PathBuf::from("/tmp/explicit")),
            backend: Some(StorageBackend::Sqlite),
            log_level: Some("error".to_string()),
        };
        let config = WipConfig::from_sources(
            overrides,
            env_from(&[("WIP_HOME", "/srv/wip"), ("WIP_BACKEND", "json")]),
        )
        .unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/tmp/explicit"));
        assert_eq!(config.backend, StorageBackend::Sqlite);
        assert_eq!(config.log_level, "error");
    }

    #[test]
    fn missing_home_and_bad_values_are_rejected() {
        let err = WipConfig::from_sources(ConfigOverrides::default(), env_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingHome);

        let err = WipConfig::from_sources(
            ConfigOverrides::default(),
            env_from(&[("HOME", "/h"), ("WIP_BACKEND", "redis")]),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedBackend("redis".to_string()));
    }
}
