//! Result, state and error types of a pipeline run.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::daemon::DaemonError;
use crate::export::{ExportError, ExportedArtifact};
use crate::image::{BuildError, ImageId};
use crate::locate::DiscoveryWarning;

/// Orchestrator states. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
  Idle,
  Locating,
  Exporting,
  Building,
  Done,
}

impl PipelineState {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Idle => "idle",
      Self::Locating => "locating",
      Self::Exporting => "exporting",
      Self::Building => "building",
      Self::Done => "done",
    }
  }
}

impl fmt::Display for PipelineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
  /// Image built, nothing went wrong.
  Success,
  /// Image built, but some non-fatal errors were recorded.
  PartialFailure,
  /// No image.
  Failed,
}

impl BuildStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Success => "success",
      Self::PartialFailure => "partial_failure",
      Self::Failed => "failed",
    }
  }
}

impl fmt::Display for BuildStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Everything that can be recorded against a run.
///
/// `Discovery`, `Export` and `Connectivity` are accumulated and do not stop
/// the run under the default policy. `Build`, `Cancelled` and
/// `Interrupted` end it.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("discovery: {0}")]
  Discovery(DiscoveryWarning),

  #[error(transparent)]
  Export(#[from] ExportError),

  #[error("connectivity: {0}")]
  Connectivity(#[source] DaemonError),

  #[error("build: {0}")]
  Build(#[from] BuildError),

  #[error("cancelled before {before}")]
  Cancelled { before: PipelineState },

  #[error("pipeline task interrupted: {0}")]
  Interrupted(String),
}

impl PipelineError {
  /// Short machine-readable category.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Discovery(_) => "discovery",
      Self::Export(_) => "export",
      Self::Connectivity(_) => "connectivity",
      Self::Build(_) => "build",
      Self::Cancelled { .. } => "cancelled",
      Self::Interrupted(_) => "interrupted",
    }
  }

  /// Whether this error alone ends a run.
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::Build(_) | Self::Cancelled { .. } | Self::Interrupted(_))
  }
}

/// Final outcome handed back to the caller.
#[derive(Debug)]
pub struct BuildResult {
  pub status: BuildStatus,
  /// Present only when an image was produced.
  pub image_id: Option<ImageId>,
  pub errors: Vec<PipelineError>,
  pub artifacts: Vec<ExportedArtifact>,
  /// State the run ended in; always `Done` for a completed run.
  pub state: PipelineState,
}

impl BuildResult {
  pub fn is_success(&self) -> bool {
    self.status == BuildStatus::Success
  }

  /// Whether an image was produced.
  pub fn has_image(&self) -> bool {
    self.image_id.is_some()
  }

  pub fn was_cancelled(&self) -> bool {
    self.errors.iter().any(|e| matches!(e, PipelineError::Cancelled { .. }))
  }

  /// Errors that were recorded against a single unit.
  pub fn export_errors(&self) -> impl Iterator<Item = &ExportError> {
    self.errors.iter().filter_map(|e| match e {
      PipelineError::Export(err) => Some(err),
      _ => None,
    })
  }
}
