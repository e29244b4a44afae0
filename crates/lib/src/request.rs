//! The caller's description of one pipeline run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
  #[error("failed to read request {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse request {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid request: {0}")]
  Invalid(String),
}

/// Immutable inputs for a single run.
///
/// ```toml
/// units = ["core-app"]
/// staging_dir = "/tmp/stage"
/// context_dir = "/tmp/ctx"
/// repository = "myapp"
/// tag = "v1"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildRequest {
  /// Names of the units whose archives go into the image.
  #[serde(default)]
  pub units: Vec<String>,
  /// Directory the exported archives are copied into.
  pub staging_dir: PathBuf,
  /// Build context handed to the container daemon.
  pub context_dir: PathBuf,
  pub repository: String,
  pub tag: String,
}

impl BuildRequest {
  pub fn new(
    units: impl IntoIterator<Item = impl Into<String>>,
    staging_dir: impl Into<PathBuf>,
    context_dir: impl Into<PathBuf>,
    repository: impl Into<String>,
    tag: impl Into<String>,
  ) -> Self {
    Self {
      units: units.into_iter().map(Into::into).collect(),
      staging_dir: staging_dir.into(),
      context_dir: context_dir.into(),
      repository: repository.into(),
      tag: tag.into(),
    }
  }

  pub fn from_file(path: &Path) -> Result<Self, RequestError> {
    let content = std::fs::read_to_string(path).map_err(|source| RequestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let request: Self = toml::from_str(&content).map_err(|source| RequestError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    request.validate()?;
    Ok(request)
  }

  /// Required unit names as a set; duplicates collapse.
  pub fn required_names(&self) -> BTreeSet<String> {
    self.units.iter().cloned().collect()
  }

  /// Image reference passed to the daemon, `repository:tag`.
  pub fn image_tag(&self) -> String {
    format!("{}:{}", self.repository, self.tag)
  }

  pub fn validate(&self) -> Result<(), RequestError> {
    if self.repository.trim().is_empty() {
      return Err(RequestError::Invalid("repository must not be empty".to_string()));
    }
    if self.tag.trim().is_empty() {
      return Err(RequestError::Invalid("tag must not be empty".to_string()));
    }
    if self.repository.contains(char::is_whitespace) || self.tag.contains(char::is_whitespace) {
      return Err(RequestError::Invalid(
        "repository and tag must not contain whitespace".to_string(),
      ));
    }
    Ok(())
  }
}
