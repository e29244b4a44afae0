//! Implementation of the `carbox build` command.
//!
//! Runs the pipeline as a background task and prints its progress. Ctrl-C
//! (or `--timeout`) requests cancellation; the run stops at the next stage
//! boundary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::warn;

use carbox_lib::export::ExportedArtifact;
use carbox_lib::progress::ProgressEvent;
use carbox_lib::{BuildRequest, BuildResult, BuildStatus, Pipeline, PipelineConfig, PipelineState};

use crate::output::{self, Mark, OutputFormat};

pub struct BuildOptions {
  pub request: Option<PathBuf>,
  pub units: Vec<String>,
  pub staging: Option<PathBuf>,
  pub context: Option<PathBuf>,
  pub repository: Option<String>,
  pub tag: Option<String>,
  pub strict_exports: bool,
  pub strict_health_check: bool,
  pub timeout: Option<Duration>,
  pub workspace: PathBuf,
  pub config: Option<PathBuf>,
  pub verbose: bool,
}

#[derive(Serialize)]
struct ErrorEntry {
  kind: &'static str,
  fatal: bool,
  message: String,
}

#[derive(Serialize)]
struct BuildSummary<'a> {
  status: BuildStatus,
  image: String,
  image_id: Option<&'a str>,
  artifacts: &'a [ExportedArtifact],
  errors: Vec<ErrorEntry>,
  duration_ms: u128,
}

pub fn cmd_build(options: BuildOptions, output: OutputFormat) -> Result<ExitCode> {
  let start = Instant::now();

  let mut config = PipelineConfig::load(options.config.as_deref()).context("Failed to load config")?;
  config.strict.exports |= options.strict_exports;
  config.strict.health_check |= options.strict_health_check;

  let request = resolve_request(&options)?;
  let pipeline = Pipeline::for_workspace(&options.workspace, config);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt.block_on(run(pipeline, request.clone(), options.timeout, output, options.verbose));

  if output.is_json() {
    print_summary_json(&request, &result, start.elapsed())?;
  } else {
    print_summary(&request, &result, start.elapsed());
  }

  Ok(match result.status {
    BuildStatus::Failed => ExitCode::FAILURE,
    BuildStatus::Success | BuildStatus::PartialFailure => ExitCode::SUCCESS,
  })
}

/// Merge the request file (if any) with the command-line flags.
fn resolve_request(options: &BuildOptions) -> Result<BuildRequest> {
  let base = match &options.request {
    Some(path) => Some(BuildRequest::from_file(path).context("Failed to load request")?),
    None => None,
  };

  let staging = options
    .staging
    .clone()
    .or_else(|| base.as_ref().map(|r| r.staging_dir.clone()));
  let context = options
    .context
    .clone()
    .or_else(|| base.as_ref().map(|r| r.context_dir.clone()));
  let repository = options
    .repository
    .clone()
    .or_else(|| base.as_ref().map(|r| r.repository.clone()));
  let tag = options.tag.clone().or_else(|| base.as_ref().map(|r| r.tag.clone()));

  let (Some(staging), Some(context), Some(repository), Some(tag)) = (staging, context, repository, tag) else {
    bail!("--staging, --context, --repository and --tag are required without a request file");
  };

  let mut units = base.map(|r| r.units).unwrap_or_default();
  units.extend(options.units.iter().cloned());

  let request = BuildRequest::new(units, staging, context, repository, tag);
  request.validate()?;
  Ok(request)
}

async fn run(
  pipeline: Pipeline,
  request: BuildRequest,
  timeout: Option<Duration>,
  output: OutputFormat,
  verbose: bool,
) -> BuildResult {
  let mut handle = pipeline.spawn(request);

  let token = handle.cancellation_token();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling after the current stage");
      token.cancel();
    }
  });

  if let Some(timeout) = timeout {
    let token = handle.cancellation_token();
    tokio::spawn(async move {
      tokio::time::sleep(timeout).await;
      warn!(timeout = %humantime::format_duration(timeout), "timeout reached, cancelling");
      token.cancel();
    });
  }

  while let Some(event) = handle.events.recv().await {
    if !output.is_json() {
      print_event(&event, verbose);
    }
  }
  handle.finish().await
}

fn print_event(event: &ProgressEvent, verbose: bool) {
  match event {
    ProgressEvent::State { state } => match state {
      PipelineState::Locating => output::stage("Locating distribution units"),
      PipelineState::Exporting => output::stage("Exporting archives"),
      PipelineState::Building => output::stage("Building image"),
      PipelineState::Idle | PipelineState::Done => {}
    },
    ProgressEvent::Progress { percent, task } => {
      if verbose {
        println!("  [{:>3}%] {}", percent, task);
      }
    }
    ProgressEvent::Exported { artifact } => output::exported(artifact),
    ProgressEvent::ExportFailed { unit, reason } => output::export_failed(unit, reason),
    ProgressEvent::Warning { message } => output::line(Mark::Warn, message),
    ProgressEvent::Daemon { message } => {
      if let Some(error) = &message.error {
        output::line(Mark::Fail, error);
      } else if verbose {
        if let Some(text) = &message.stream {
          output::daemon_line(text);
        }
      }
    }
    ProgressEvent::ImageBuilt { .. } | ProgressEvent::Finished { .. } => {}
  }
}

fn print_summary(request: &BuildRequest, result: &BuildResult, elapsed: Duration) {
  println!();
  match (&result.status, &result.image_id) {
    (BuildStatus::Success, Some(id)) => output::line(Mark::Ok, format!("Built {} ({})", request.image_tag(), id)),
    (BuildStatus::PartialFailure, Some(id)) => output::line(
      Mark::Warn,
      format!("Built {} ({}) with errors", request.image_tag(), id),
    ),
    _ if result.was_cancelled() => output::line(Mark::Fail, "Build cancelled"),
    _ => output::line(Mark::Fail, "Build failed"),
  }
  output::field("Status", result.status.as_str());
  output::field("Exported", result.artifacts.len());
  output::field("Errors", result.errors.len());
  output::field("Duration", output::elapsed(elapsed));

  for error in &result.errors {
    output::line(Mark::Fail, format!("[{}] {}", error.kind(), error));
  }
}

fn print_summary_json(request: &BuildRequest, result: &BuildResult, elapsed: Duration) -> Result<()> {
  let summary = BuildSummary {
    status: result.status,
    image: request.image_tag(),
    image_id: result.image_id.as_ref().map(|id| id.0.as_str()),
    artifacts: &result.artifacts,
    errors: result
      .errors
      .iter()
      .map(|e| ErrorEntry {
        kind: e.kind(),
        fatal: e.is_fatal(),
        message: e.to_string(),
      })
      .collect(),
    duration_ms: elapsed.as_millis(),
  };
  output::json(&summary)
}
