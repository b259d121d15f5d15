use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::sync::DEFAULT_LIST_ICON;

pub const REMOTE_PATH_ENV: &str = "DAYBOOK_REMOTE_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub remote_path: Option<String>,
    pub default_icon: String,
    pub push_on_write: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_path: None,
            default_icon: DEFAULT_LIST_ICON.to_string(),
            push_on_write: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfigFile {
    #[serde(default)]
    remote: RawRemote,
    #[serde(default)]
    lists: RawLists,
    #[serde(default)]
    sync: RawSync,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRemote {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLists {
    default_icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSync {
    push_on_write: Option<bool>,
}

impl Config {
    /// Reads the config file if it exists and applies the remote path
    /// override from the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(err) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        };
        if let Some(remote) = std::env::var(REMOTE_PATH_ENV)
            .ok()
            .and_then(|value| non_empty(&value))
        {
            config.remote_path = Some(remote);
        }
        Ok(config)
    }

    pub(crate) fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let file: RawConfigFile = toml::from_str(raw)?;
        let defaults = Self::default();
        let default_icon = match file.lists.default_icon {
            Some(icon) if icon.trim().is_empty() => {
                return Err(ConfigError::Invalid(
                    "lists.default_icon cannot be empty".to_string(),
                ))
            }
            Some(icon) => icon,
            None => defaults.default_icon,
        };
        Ok(Self {
            remote_path: file.remote.path.as_deref().and_then(non_empty),
            default_icon,
            push_on_write: file.sync.push_on_write.unwrap_or(defaults.push_on_write),
        })
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Toml(err) => write!(f, "invalid config TOML: {}", err),
            ConfigError::Invalid(message) => write!(f, "invalid config: {}", message),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}
