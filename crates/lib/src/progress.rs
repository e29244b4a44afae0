//! Progress events published while a pipeline runs.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

use crate::daemon::DaemonMessage;
use crate::export::ExportedArtifact;
use crate::image::ImageId;
use crate::pipeline::{BuildStatus, PipelineState};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
  /// The orchestrator moved to a new state.
  State { state: PipelineState },
  /// A checkpoint was reached; `percent` never decreases within a run.
  Progress { percent: u8, task: String },
  Exported { artifact: ExportedArtifact },
  ExportFailed { unit: String, reason: String },
  /// Recorded, non-fatal problem.
  Warning { message: String },
  /// Message forwarded from the container daemon.
  Daemon { message: DaemonMessage },
  ImageBuilt { image_id: ImageId },
  Finished { status: BuildStatus },
}

/// Sending half of the event stream.
///
/// Events are dropped silently once the receiver is gone; a disabled sink
/// discards everything.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
  tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSink {
  pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
    Self { tx: Some(tx) }
  }

  pub fn disabled() -> Self {
    Self { tx: None }
  }

  /// Bounded channel of the given capacity and a sink feeding it.
  pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Self::new(tx), rx)
  }

  pub async fn emit(&self, event: ProgressEvent) {
    let Some(tx) = &self.tx else { return };
    if tx.send(event).await.is_err() {
      trace!("progress receiver dropped");
    }
  }
}
