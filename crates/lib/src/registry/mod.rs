//! Project registry surface.
//!
//! The locator only ever talks to a [`ProjectRegistry`]; where projects come
//! from is up to the implementation. [`WorkspaceRegistry`] reads an
//! Eclipse-style workspace directory.

mod workspace;

use std::path::PathBuf;

use thiserror::Error;

pub use workspace::WorkspaceRegistry;

/// Errors raised while querying the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("project not found: {0}")]
  NotFound(String),

  #[error("failed to read project metadata {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid project metadata {path}: {message}")]
  Metadata { path: PathBuf, message: String },
}

/// A project as listed by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEntry {
  pub name: String,
  pub location: PathBuf,
}

/// Read-only view over the projects known to a workspace.
pub trait ProjectRegistry: Send + Sync {
  /// All known projects, in discovery order.
  fn list_projects(&self) -> Result<Vec<ProjectEntry>, RegistryError>;

  /// Whether the project is currently open/available.
  fn is_open(&self, name: &str) -> bool;

  /// Whether the project carries the given nature marker.
  fn has_marker(&self, name: &str, marker: &str) -> Result<bool, RegistryError>;

  /// Path of the project's package descriptor, `None` when it doesn't expose one.
  fn descriptor_file(&self, name: &str) -> Option<PathBuf>;
}
