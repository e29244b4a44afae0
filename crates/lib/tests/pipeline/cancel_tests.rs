use std::sync::Arc;

use carbox_lib::progress::ProgressEvent;
use carbox_lib::registry::WorkspaceRegistry;
use carbox_lib::{BuildStatus, Pipeline, PipelineConfig, PipelineError, PipelineState};

use super::common::{GatedPackager, RecordingDaemon, TestWorkspace};

#[tokio::test]
async fn cancel_during_export_stops_before_build() {
  let ws = TestWorkspace::new();
  ws.add_distribution("core-app");

  let packager = GatedPackager::new();
  let gate = packager.gate.clone();
  let started = packager.started.clone();
  let daemon = Arc::new(RecordingDaemon::new());
  let pipeline = Pipeline::new(
    Arc::new(WorkspaceRegistry::new(ws.root())),
    Arc::new(packager),
    daemon.clone(),
    PipelineConfig::default(),
  );

  let mut handle = pipeline.spawn(ws.request(&["core-app"]));
  started.notified().await;
  handle.cancel();
  gate.notify_one();

  let mut states = Vec::new();
  while let Some(event) = handle.events.recv().await {
    if let ProgressEvent::State { state } = event {
      states.push(state);
    }
  }
  let result = handle.finish().await;

  assert_eq!(result.status, BuildStatus::Failed);
  assert!(matches!(
    result.errors[..],
    [PipelineError::Cancelled {
      before: PipelineState::Building
    }]
  ));
  // The export that was in flight still completed.
  assert_eq!(result.artifacts.len(), 1);
  assert!(ws.staging().join("core-app_1.0.0.car").is_file());
  assert!(daemon.builds.lock().unwrap().is_empty());
  assert_eq!(
    states,
    vec![PipelineState::Locating, PipelineState::Exporting, PipelineState::Done]
  );
}

#[tokio::test]
async fn uncancelled_handle_runs_to_completion() {
  let ws = TestWorkspace::new();
  ws.add_distribution("core-app");

  let packager = GatedPackager::new();
  packager.gate.notify_one();
  let daemon = Arc::new(RecordingDaemon::new());
  let pipeline = Pipeline::new(
    Arc::new(WorkspaceRegistry::new(ws.root())),
    Arc::new(packager),
    daemon.clone(),
    PipelineConfig::default(),
  );

  let handle = pipeline.spawn(ws.request(&["core-app"]));
  let result = handle.finish().await;

  assert_eq!(result.status, BuildStatus::Success);
  assert_eq!(result.image_id.map(|id| id.0), Some("sha256:recorded".to_string()));
  assert_eq!(*daemon.builds.lock().unwrap(), vec!["myapp:v1".to_string()]);
}
