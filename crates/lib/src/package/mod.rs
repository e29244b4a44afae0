//! Packaging step: turns a project's descriptor into a distributable archive.

mod maven;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use maven::MavenPackager;

#[derive(Debug, Error)]
pub enum PackagingError {
  #[error("failed to launch {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("packaging failed with exit code {code:?}: {message}")]
  Failed { code: Option<i32>, message: String },

  #[error("packaging produced no archive in {0}")]
  NoOutput(PathBuf),

  #[error("packaging error: {0}")]
  Other(String),
}

/// External packaging collaborator.
#[async_trait]
pub trait Packager: Send + Sync {
  /// Package the project described by `descriptor` and return the archive it produced.
  async fn package_project(&self, descriptor: &Path) -> Result<PathBuf, PackagingError>;
}
