//! Runs the pipeline with the real Maven and docker adapters pointed at
//! shell scripts.

use carbox_lib::daemon::DaemonMessage;
use carbox_lib::progress::{ProgressEvent, ProgressSink};
use carbox_lib::{BuildStatus, Pipeline, PipelineConfig, PipelineError};
use serial_test::serial;
use tokio_util::sync::CancellationToken;

use super::common::{TestWorkspace, drain};

/// Writes `target/<dir>_1.0.0.car`, failing for a project named `broken`.
const FAKE_MAVEN: &str = r#"name=$(basename "$(pwd -P)")
if [ "$name" = broken ]; then
  echo "[ERROR] COMPILATION ERROR" >&2
  exit 1
fi
mkdir -p target
printf '%s archive' "$name" > "target/${name}_1.0.0.car"
"#;

/// Answers `version`, lists the staged archives and writes the iidfile.
const FAKE_DOCKER: &str = r#"if [ "$3" = version ]; then
  echo 27.0.1
  exit 0
fi
echo "Step 1/2 : FROM wso2/wso2mi"
ls "${10}/carbonapps"
printf 'sha256:e2e' > "$7"
"#;

const DOWN_DOCKER: &str = r#"if [ "$3" = version ]; then
  echo "Cannot connect to the Docker daemon" >&2
  exit 1
fi
printf 'sha256:late' > "$7"
"#;

fn config(ws: &TestWorkspace, docker: &str) -> PipelineConfig {
  PipelineConfig {
    maven_bin: ws.tool("fake-mvn", FAKE_MAVEN),
    docker_bin: ws.tool("fake-docker", docker),
    ..PipelineConfig::default()
  }
}

fn daemon_lines(events: &[ProgressEvent]) -> Vec<String> {
  events
    .iter()
    .filter_map(|e| match e {
      ProgressEvent::Daemon {
        message: DaemonMessage {
          stream: Some(line), ..
        },
      } => Some(line.clone()),
      _ => None,
    })
    .collect()
}

#[tokio::test]
#[serial]
async fn builds_image_from_requested_units() {
  let ws = TestWorkspace::new();
  ws.add_distribution("core-app");
  ws.add_distribution("ext-app");
  ws.add_distribution("closed-app");
  ws.add_project("library", &["org.eclipse.jdt.core.javanature"]);
  ws.close(&["closed-app"]);

  let pipeline = Pipeline::for_workspace(&ws.root(), config(&ws, FAKE_DOCKER));
  let (sink, rx) = ProgressSink::channel(256);
  let result = pipeline
    .run(
      &ws.request(&["ext-app", "core-app", "closed-app", "library", "missing-app"]),
      &sink,
      &CancellationToken::new(),
    )
    .await;
  drop(sink);
  let events = drain(rx).await;

  assert_eq!(result.status, BuildStatus::Success, "errors: {:?}", result.errors);
  assert_eq!(result.image_id.as_ref().map(|id| id.0.as_str()), Some("sha256:e2e"));

  let units: Vec<&str> = result.artifacts.iter().map(|a| a.unit.as_str()).collect();
  assert_eq!(units, vec!["core-app", "ext-app"]);
  assert_eq!(
    std::fs::read_to_string(ws.staging().join("ext-app_1.0.0.car")).unwrap(),
    "ext-app archive"
  );
  assert!(!ws.staging().join("closed-app_1.0.0.car").exists());

  // The daemon saw the staged archives in its build context.
  let lines = daemon_lines(&events);
  assert!(lines.iter().any(|l| l == "core-app_1.0.0.car"));
  assert!(lines.iter().any(|l| l == "ext-app_1.0.0.car"));
}

#[tokio::test]
#[serial]
async fn failed_unit_still_produces_image() {
  let ws = TestWorkspace::new();
  ws.add_distribution("core-app");
  ws.add_distribution("broken");

  let pipeline = Pipeline::for_workspace(&ws.root(), config(&ws, FAKE_DOCKER));
  let result = pipeline
    .run(
      &ws.request(&["core-app", "broken"]),
      &ProgressSink::disabled(),
      &CancellationToken::new(),
    )
    .await;

  assert_eq!(result.status, BuildStatus::PartialFailure);
  assert!(result.has_image());
  let failed: Vec<&str> = result.export_errors().map(|e| e.unit.as_str()).collect();
  assert_eq!(failed, vec!["broken"]);
  assert!(result.errors[0].to_string().contains("COMPILATION ERROR"));
  assert_eq!(result.artifacts.len(), 1);
}

#[tokio::test]
#[serial]
async fn unreachable_daemon_is_tolerated_by_default() {
  let ws = TestWorkspace::new();
  ws.add_distribution("core-app");

  let pipeline = Pipeline::for_workspace(&ws.root(), config(&ws, DOWN_DOCKER));
  let result = pipeline
    .run(&ws.request(&["core-app"]), &ProgressSink::disabled(), &CancellationToken::new())
    .await;

  assert_eq!(result.status, BuildStatus::PartialFailure);
  assert_eq!(result.image_id.as_ref().map(|id| id.0.as_str()), Some("sha256:late"));
  assert!(matches!(result.errors[..], [PipelineError::Connectivity(_)]));
}

#[tokio::test]
#[serial]
async fn strict_health_check_refuses_to_build() {
  let ws = TestWorkspace::new();
  ws.add_distribution("core-app");

  let mut config = config(&ws, DOWN_DOCKER);
  config.strict.health_check = true;
  let pipeline = Pipeline::for_workspace(&ws.root(), config);
  let result = pipeline
    .run(&ws.request(&["core-app"]), &ProgressSink::disabled(), &CancellationToken::new())
    .await;

  assert_eq!(result.status, BuildStatus::Failed);
  assert!(result.image_id.is_none());
  assert_eq!(result.artifacts.len(), 1);
  assert!(result.errors.iter().any(|e| e.is_fatal()));
}
