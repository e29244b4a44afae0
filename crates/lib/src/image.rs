//! Image builder: health-checks the daemon and drives one from-scratch build.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::daemon::{BuildFlags, ContainerDaemon, DaemonError, DaemonMessage};
use crate::progress::{ProgressEvent, ProgressSink};

/// Identifier of a built image, as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl fmt::Display for ImageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Error)]
pub enum BuildError {
  /// Health check failed and the builder was told not to continue.
  #[error("daemon health check failed: {0}")]
  Unreachable(#[source] DaemonError),

  #[error(transparent)]
  Daemon(#[from] DaemonError),

  /// The daemon streamed an error message.
  #[error("daemon reported: {0}")]
  Reported(String),

  #[error("build finished without reporting an image id")]
  MissingImageId,
}

/// Result of one build call, plus the health-check failure it tolerated.
#[derive(Debug)]
pub struct BuildAttempt {
  pub outcome: Result<ImageId, BuildError>,
  /// Set when the health check failed but the build went ahead anyway.
  pub connectivity: Option<DaemonError>,
}

pub struct ImageBuilder {
  daemon: Arc<dyn ContainerDaemon>,
  abort_on_unreachable: bool,
}

impl ImageBuilder {
  pub fn new(daemon: Arc<dyn ContainerDaemon>) -> Self {
    Self {
      daemon,
      abort_on_unreachable: false,
    }
  }

  /// Fail instead of attempting the build when the health check fails.
  pub fn abort_on_unreachable(mut self, abort: bool) -> Self {
    self.abort_on_unreachable = abort;
    self
  }

  /// Build `context_dir` into `repository:tag`.
  pub async fn build(&self, context_dir: &Path, repository: &str, tag: &str, progress: &ProgressSink) -> BuildAttempt {
    let endpoint = self.daemon.endpoint().clone();
    let mut connectivity = None;

    if let Err(e) = self.daemon.ping().await {
      if self.abort_on_unreachable {
        error!(endpoint = %endpoint, error = %e, "daemon unreachable, aborting build");
        return BuildAttempt {
          outcome: Err(BuildError::Unreachable(e)),
          connectivity: None,
        };
      }
      warn!(endpoint = %endpoint, error = %e, "daemon health check failed, attempting build anyway");
      progress
        .emit(ProgressEvent::Warning {
          message: e.to_string(),
        })
        .await;
      connectivity = Some(e);
    }

    let image_tag = format!("{}:{}", repository, tag);
    let outcome = self.run_build(context_dir, &image_tag, progress).await;
    match &outcome {
      Ok(id) => {
        info!(image = %id, tag = %image_tag, "image built");
        progress.emit(ProgressEvent::ImageBuilt { image_id: id.clone() }).await;
      }
      Err(e) => error!(tag = %image_tag, error = %e, "image build failed"),
    }

    BuildAttempt { outcome, connectivity }
  }

  async fn run_build(&self, context_dir: &Path, image_tag: &str, progress: &ProgressSink) -> Result<ImageId, BuildError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<DaemonMessage>();

    let build = self
      .daemon
      .build(context_dir, image_tag, BuildFlags::from_scratch(), tx);

    let consume = async {
      let mut image_id = None;
      let mut reported = None;
      while let Some(message) = rx.recv().await {
        if let Some(err) = &message.error {
          reported.get_or_insert_with(|| err.clone());
        }
        if let Some(id) = &message.image_id {
          image_id = Some(ImageId(id.clone()));
        }
        progress.emit(ProgressEvent::Daemon { message }).await;
      }
      (image_id, reported)
    };

    let (result, (image_id, reported)) = tokio::join!(build, consume);
    result?;

    if let Some(message) = reported {
      return Err(BuildError::Reported(message));
    }
    image_id.ok_or(BuildError::MissingImageId)
  }
}
