//! Configuration loading for Arbiter.
//!
//! Raw TOML deserialization structs (with `Option` fields) stay private here.
//! [`EngineConfig::from_toml_str`] resolves them into a validated config with
//! concrete durations; nothing downstream sees an unresolved value.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;
use toml::de;

/// Default per-prompt deadline.
pub const DEFAULT_INPUT_TIMEOUT: Duration = Duration::from_secs(25);

/// Extra group-level window layered on top of the prompt deadline, absorbing
/// answers that are still in transit when the deadline passes.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "ARBITER_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    input: Option<RawInputConfig>,
    game: Option<RawGameConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInputConfig {
    default_timeout_secs: Option<u64>,
    grace_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGameConfig {
    #[serde(default)]
    debug: bool,
}

/// Resolved engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    default_timeout: Duration,
    grace: Duration,
    debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_INPUT_TIMEOUT,
            grace: DEFAULT_GRACE,
            debug: false,
        }
    }
}

impl EngineConfig {
    /// Location of the config file: `$ARBITER_CONFIG`, else `~/.arbiter/config.toml`.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        if let Some(explicit) = env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(explicit));
        }
        dirs::home_dir().map(|home| home.join(".arbiter").join("config.toml"))
    }

    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    /// Load from an explicit path. `Ok(None)` when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(None);
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), ?config, "Loaded config");
        Ok(Some(config))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, de::Error> {
        let raw: RawConfig = toml::from_str(text)?;
        Ok(Self::resolve(raw))
    }

    fn resolve(raw: RawConfig) -> Self {
        let defaults = Self::default();
        let input = raw.input.unwrap_or_default();
        Self {
            default_timeout: input
                .default_timeout_secs
                .map_or(defaults.default_timeout, Duration::from_secs),
            grace: input.grace_secs.map_or(defaults.grace, Duration::from_secs),
            debug: raw.game.is_some_and(|g| g.debug),
        }
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    #[must_use]
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Escalate prompt parse failures to fatal errors instead of treating them
    /// as "no answer".
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }
}
