//! Pipeline configuration.
//!
//! Configuration is read from TOML. Resolution order:
//! 1. an explicit path passed by the caller
//! 2. `$CARBOX_CONFIG`
//! 3. `<config_dir>/carbox/config.toml` when it exists
//! 4. built-in defaults
//!
//! `CARBOX_MAVEN_BIN` and `CARBOX_DOCKER_BIN` override the tool binaries
//! after the file has been read.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{DEFAULT_EVENT_BUFFER, DESCRIPTOR_FILE, DISTRIBUTION_NATURE};
use crate::platform::paths;

pub const CONFIG_ENV: &str = "CARBOX_CONFIG";
pub const MAVEN_BIN_ENV: &str = "CARBOX_MAVEN_BIN";
pub const DOCKER_BIN_ENV: &str = "CARBOX_DOCKER_BIN";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid config: {0}")]
  Invalid(String),
}

/// Switches that turn the default lenient policies into hard failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrictMode {
  /// Abort on the first export failure instead of building anyway.
  pub exports: bool,
  /// Abort when the daemon health check fails instead of attempting the build.
  pub health_check: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
  /// Nature a project must carry to count as a distribution unit.
  pub marker: String,
  /// Package descriptor file name inside each project.
  pub descriptor: String,
  pub maven_bin: String,
  pub docker_bin: String,
  /// Capacity of the progress event channel.
  pub event_buffer: usize,
  pub strict: StrictMode,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      marker: DISTRIBUTION_NATURE.to_string(),
      descriptor: DESCRIPTOR_FILE.to_string(),
      maven_bin: "mvn".to_string(),
      docker_bin: "docker".to_string(),
      event_buffer: DEFAULT_EVENT_BUFFER,
      strict: StrictMode::default(),
    }
  }
}

impl PipelineConfig {
  /// Parse a config from TOML text.
  pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: origin.to_path_buf(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_toml(&content, path)
  }

  /// Resolve and load the configuration, then apply environment overrides.
  pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    let mut config = match Self::resolve_path(explicit) {
      Some(path) => {
        debug!(path = %path.display(), "loading config");
        Self::from_file(&path)?
      }
      None => {
        debug!("no config file found, using defaults");
        Self::default()
      }
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
  }

  fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
      return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
      return Some(PathBuf::from(path));
    }
    paths::config_file().filter(|p| p.is_file())
  }

  fn apply_env(&mut self) {
    if let Some(bin) = std::env::var(MAVEN_BIN_ENV).ok().filter(|b| !b.is_empty()) {
      self.maven_bin = bin;
    }
    if let Some(bin) = std::env::var(DOCKER_BIN_ENV).ok().filter(|b| !b.is_empty()) {
      self.docker_bin = bin;
    }
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.marker.trim().is_empty() {
      return Err(ConfigError::Invalid("marker must not be empty".to_string()));
    }
    if self.descriptor.trim().is_empty() {
      return Err(ConfigError::Invalid("descriptor must not be empty".to_string()));
    }
    if self.event_buffer == 0 {
      return Err(ConfigError::Invalid("event_buffer must be at least 1".to_string()));
    }
    Ok(())
  }
}
