//! Core configuration.
//!
//! # Responsibility
//! - Describe which backing store to open and how keys and ids are shaped.
//! - Load configuration from an optional JSON file.
//!
//! # Invariants
//! - A missing config file yields `CoreConfig::default()`.
//! - `key_prefix` is a non-empty run of `[A-Za-z0-9_.-]`.

use crate::logging::default_log_level;
use crate::repo::ids::IdStrategy;
use crate::repo::note_repo::{FieldKeys, RepoOptions, DEFAULT_KEY_PREFIX};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

static KEY_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid key prefix regex"));

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Backing store selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Session-only storage; nothing survives the process.
    #[default]
    Memory,
    /// Durable SQLite file shared by every context that opens it.
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub key_prefix: String,
    pub id_strategy: IdStrategy,
    pub storage: StorageConfig,
    /// `trace|debug|info|warn|error`; build-mode default when unset.
    pub log_level: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            id_strategy: IdStrategy::default(),
            storage: StorageConfig::default(),
            log_level: None,
        }
    }
}

impl CoreConfig {
    /// Reads `path`, or returns defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !KEY_PREFIX_RE.is_match(&self.key_prefix) {
            return Err(ConfigError::Invalid(format!(
                "key_prefix `{}` must match [A-Za-z0-9_.-]+",
                self.key_prefix
            )));
        }
        if let StorageConfig::Sqlite { path } = &self.storage {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage.path cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn effective_log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or_else(|| default_log_level())
    }

    pub fn repo_options(&self) -> RepoOptions {
        RepoOptions {
            keys: FieldKeys::with_prefix(&self.key_prefix),
            id_strategy: self.id_strategy,
        }
    }
}
