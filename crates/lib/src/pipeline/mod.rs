//! Pipeline orchestrator.
//!
//! Runs `Idle → Locating → Exporting → Building → Done` as one unit of work:
//! - discover distribution units and keep the requested ones
//! - export each one into the staging directory, recording failures
//! - build the image from the build context
//!
//! Stages run strictly one after another. Cancellation is cooperative and is
//! only observed between stages; once `Building` starts the run completes.

mod types;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::daemon::{ContainerDaemon, DockerCli, Endpoint};
use crate::export::{ExportedArtifact, Exporter};
use crate::image::{ImageBuilder, ImageId};
use crate::locate::{Discovery, DiscoveryWarning, Locator};
use crate::package::{MavenPackager, Packager};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::registry::{ProjectRegistry, WorkspaceRegistry};
use crate::request::BuildRequest;

pub use types::{BuildResult, BuildStatus, PipelineError, PipelineState};

/// Share of overall progress each checkpoint accounts for.
pub const DISCOVERY_WEIGHT: u8 = 10;
pub const FILTER_WEIGHT: u8 = 5;
pub const EXPORT_WEIGHT: u8 = 50;
pub const BUILD_WEIGHT: u8 = 35;

pub const DISCOVERY_TASK: &str = "Fetching all distribution projects";
pub const FILTER_TASK: &str = "Filtering required distribution projects";
pub const EXPORT_TASK: &str = "Exporting required archives to the staging folder";
pub const BUILD_TASK: &str = "Building container image";

pub struct Pipeline {
  locator: Arc<Locator>,
  exporter: Exporter,
  builder: ImageBuilder,
  config: PipelineConfig,
}

impl Pipeline {
  pub fn new(
    registry: Arc<dyn ProjectRegistry>,
    packager: Arc<dyn Packager>,
    daemon: Arc<dyn ContainerDaemon>,
    config: PipelineConfig,
  ) -> Self {
    Self {
      locator: Arc::new(Locator::new(registry.clone(), config.marker.clone())),
      exporter: Exporter::new(registry, packager),
      builder: ImageBuilder::new(daemon).abort_on_unreachable(config.strict.health_check),
      config,
    }
  }

  /// Pipeline over a workspace directory using Maven and the `docker` CLI.
  pub fn for_workspace(workspace: &Path, config: PipelineConfig) -> Self {
    let registry = Arc::new(WorkspaceRegistry::with_descriptor(workspace, config.descriptor.clone()));
    let packager = Arc::new(MavenPackager::new(config.maven_bin.clone()));
    let daemon = Arc::new(DockerCli::new(config.docker_bin.clone(), Endpoint::current()));
    Self::new(registry, packager, daemon, config)
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// Run the pipeline on the current task.
  pub async fn run(&self, request: &BuildRequest, progress: &ProgressSink, cancel: &CancellationToken) -> BuildResult {
    let span = info_span!("pipeline", image = %request.image_tag());
    self.run_inner(request, progress, cancel).instrument(span).await
  }

  /// Run the pipeline as a background task.
  pub fn spawn(self, request: BuildRequest) -> PipelineHandle {
    let (sink, events) = ProgressSink::channel(self.config.event_buffer);
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move { self.run(&request, &sink, &token).await });
    PipelineHandle { events, cancel, task }
  }

  /// Registry scans hit the filesystem, so they run on the blocking pool.
  async fn discover(&self) -> Discovery {
    let locator = self.locator.clone();
    match tokio::task::spawn_blocking(move || locator.discover()).await {
      Ok(discovery) => discovery,
      Err(e) => {
        error!(error = %e, "discovery task failed");
        Discovery {
          units: Vec::new(),
          warnings: vec![DiscoveryWarning {
            project: None,
            message: format!("discovery task failed: {}", e),
          }],
        }
      }
    }
  }

  async fn run_inner(&self, request: &BuildRequest, progress: &ProgressSink, cancel: &CancellationToken) -> BuildResult {
    let mut run = Run::new(progress);

    // Locating
    if let Some(result) = run.enter(PipelineState::Locating, cancel).await {
      return result;
    }
    let discovery = self.discover().await;
    for warning in discovery.warnings {
      run.warn(PipelineError::Discovery(warning)).await;
    }
    run.checkpoint(DISCOVERY_WEIGHT, DISCOVERY_TASK).await;

    let units = self.locator.filter(discovery.units, &request.required_names());
    info!(requested = request.units.len(), matched = units.len(), "selected units");
    run.checkpoint(FILTER_WEIGHT, FILTER_TASK).await;

    // Exporting
    if let Some(result) = run.enter(PipelineState::Exporting, cancel).await {
      return result;
    }
    for unit in &units {
      match self.exporter.export(unit, &request.staging_dir).await {
        Ok(artifact) => {
          run
            .progress
            .emit(ProgressEvent::Exported {
              artifact: artifact.clone(),
            })
            .await;
          run.artifacts.push(artifact);
        }
        Err(e) => {
          error!(unit = %e.unit, error = %e.reason, "export failed");
          run
            .progress
            .emit(ProgressEvent::ExportFailed {
              unit: e.unit.clone(),
              reason: e.reason.to_string(),
            })
            .await;
          run.errors.push(PipelineError::Export(e));
          if self.config.strict.exports {
            warn!("strict export mode, skipping image build");
            return run.finish(None).await;
          }
        }
      }
    }
    run.checkpoint(EXPORT_WEIGHT, EXPORT_TASK).await;

    // Building
    if let Some(result) = run.enter(PipelineState::Building, cancel).await {
      return result;
    }
    let attempt = self
      .builder
      .build(&request.context_dir, &request.repository, &request.tag, progress)
      .await;
    if let Some(e) = attempt.connectivity {
      run.errors.push(PipelineError::Connectivity(e));
    }
    match attempt.outcome {
      Ok(image_id) => {
        run.checkpoint(BUILD_WEIGHT, BUILD_TASK).await;
        run.finish(Some(image_id)).await
      }
      Err(e) => {
        run.errors.push(PipelineError::Build(e));
        run.finish(None).await
      }
    }
  }
}

/// Mutable bookkeeping for one run.
struct Run<'a> {
  progress: &'a ProgressSink,
  state: PipelineState,
  percent: u8,
  errors: Vec<PipelineError>,
  artifacts: Vec<ExportedArtifact>,
}

impl<'a> Run<'a> {
  fn new(progress: &'a ProgressSink) -> Self {
    Self {
      progress,
      state: PipelineState::Idle,
      percent: 0,
      errors: Vec::new(),
      artifacts: Vec::new(),
    }
  }

  /// Move to `next`, unless cancellation was requested; then finish instead.
  async fn enter(&mut self, next: PipelineState, cancel: &CancellationToken) -> Option<BuildResult> {
    debug_assert!(next > self.state, "pipeline state must move forward");
    if cancel.is_cancelled() {
      warn!(before = %next, "pipeline cancelled");
      self.errors.push(PipelineError::Cancelled { before: next });
      return Some(self.finish(None).await);
    }
    debug!(from = %self.state, to = %next, "state transition");
    self.state = next;
    self.progress.emit(ProgressEvent::State { state: next }).await;
    None
  }

  async fn warn(&mut self, error: PipelineError) {
    warn!(error = %error, "recorded warning");
    self
      .progress
      .emit(ProgressEvent::Warning {
        message: error.to_string(),
      })
      .await;
    self.errors.push(error);
  }

  async fn checkpoint(&mut self, weight: u8, task: &str) {
    self.percent = self.percent.saturating_add(weight).min(100);
    self
      .progress
      .emit(ProgressEvent::Progress {
        percent: self.percent,
        task: task.to_string(),
      })
      .await;
  }

  async fn finish(&mut self, image_id: Option<ImageId>) -> BuildResult {
    let status = match (&image_id, self.errors.is_empty()) {
      (None, _) => BuildStatus::Failed,
      (Some(_), true) => BuildStatus::Success,
      (Some(_), false) => BuildStatus::PartialFailure,
    };

    info!(status = %status, errors = self.errors.len(), exported = self.artifacts.len(), "pipeline finished");
    self.progress.emit(ProgressEvent::State { state: PipelineState::Done }).await;
    self.progress.emit(ProgressEvent::Finished { status }).await;

    self.state = PipelineState::Done;
    BuildResult {
      status,
      image_id,
      errors: std::mem::take(&mut self.errors),
      artifacts: std::mem::take(&mut self.artifacts),
      state: self.state,
    }
  }
}

/// A pipeline running in the background.
///
/// Drain `events` (or drop them) so the run is never held up on a full
/// channel, then call [`PipelineHandle::finish`].
pub struct PipelineHandle {
  pub events: mpsc::Receiver<ProgressEvent>,
  cancel: CancellationToken,
  task: JoinHandle<BuildResult>,
}

impl PipelineHandle {
  /// Request cancellation; observed at the next stage boundary.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  /// Wait for the run to complete.
  pub async fn finish(self) -> BuildResult {
    drop(self.events);
    match self.task.await {
      Ok(result) => result,
      Err(e) => BuildResult {
        status: BuildStatus::Failed,
        image_id: None,
        errors: vec![PipelineError::Interrupted(e.to_string())],
        artifacts: Vec::new(),
        state: PipelineState::Done,
      },
    }
  }
}
