//! Shared helpers for pipeline integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use carbox_lib::BuildRequest;
use carbox_lib::consts::DISTRIBUTION_NATURE;
use carbox_lib::daemon::{BuildFlags, ContainerDaemon, DaemonError, DaemonMessage, Endpoint};
use carbox_lib::package::{Packager, PackagingError};
use carbox_lib::progress::ProgressEvent;
use tempfile::TempDir;
use tokio::sync::{Notify, mpsc};

/// Isolated workspace with a build context whose `carbonapps/` folder is the
/// staging directory.
pub struct TestWorkspace {
  pub temp: TempDir,
}

impl TestWorkspace {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("workspace")).unwrap();
    std::fs::create_dir_all(temp.path().join("context")).unwrap();
    Self { temp }
  }

  pub fn root(&self) -> PathBuf {
    self.temp.path().join("workspace")
  }

  pub fn context(&self) -> PathBuf {
    self.temp.path().join("context")
  }

  pub fn staging(&self) -> PathBuf {
    self.context().join("carbonapps")
  }

  /// Add a project carrying the distribution nature and a `pom.xml`.
  pub fn add_distribution(&self, name: &str) -> PathBuf {
    self.add_project(name, &[DISTRIBUTION_NATURE])
  }

  pub fn add_project(&self, name: &str, natures: &[&str]) -> PathBuf {
    let dir = self.root().join(name);
    std::fs::create_dir_all(&dir).unwrap();
    let natures: String = natures.iter().map(|n| format!("<nature>{}</nature>", n)).collect();
    std::fs::write(
      dir.join(".project"),
      format!(
        "<projectDescription><name>{}</name><natures>{}</natures></projectDescription>",
        name, natures
      ),
    )
    .unwrap();
    std::fs::write(
      dir.join("pom.xml"),
      format!(
        "<project><artifactId>{}</artifactId><version>1.0.0</version><packaging>carbon/application</packaging></project>",
        name
      ),
    )
    .unwrap();
    dir
  }

  /// Mark projects as closed.
  pub fn close(&self, names: &[&str]) {
    std::fs::write(self.root().join(".closed"), names.join("\n")).unwrap();
  }

  pub fn request(&self, units: &[&str]) -> BuildRequest {
    BuildRequest::new(units.iter().copied(), self.staging(), self.context(), "myapp", "v1")
  }

  /// Write an executable shell script standing in for a tool binary.
  #[cfg(unix)]
  pub fn tool(&self, name: &str, script: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = self.temp.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().to_string()
  }
}

pub async fn drain(mut rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
  let mut events = Vec::new();
  while let Some(event) = rx.recv().await {
    events.push(event);
  }
  events
}

/// Packager that blocks until released, then writes `target/out.car`.
pub struct GatedPackager {
  pub gate: Arc<Notify>,
  pub started: Arc<Notify>,
}

impl GatedPackager {
  pub fn new() -> Self {
    Self {
      gate: Arc::new(Notify::new()),
      started: Arc::new(Notify::new()),
    }
  }
}

#[async_trait]
impl Packager for GatedPackager {
  async fn package_project(&self, descriptor: &Path) -> Result<PathBuf, PackagingError> {
    self.started.notify_one();
    self.gate.notified().await;
    let target = descriptor.parent().unwrap().join("target");
    std::fs::create_dir_all(&target).unwrap();
    let path = target.join("out.car");
    std::fs::write(&path, b"archive").unwrap();
    Ok(path)
  }
}

/// Daemon that records build tags and always succeeds.
pub struct RecordingDaemon {
  endpoint: Endpoint,
  pub builds: Mutex<Vec<String>>,
}

impl RecordingDaemon {
  pub fn new() -> Self {
    Self {
      endpoint: Endpoint::current(),
      builds: Mutex::new(Vec::new()),
    }
  }
}

#[async_trait]
impl ContainerDaemon for RecordingDaemon {
  fn endpoint(&self) -> &Endpoint {
    &self.endpoint
  }

  async fn ping(&self) -> Result<(), DaemonError> {
    Ok(())
  }

  async fn build(
    &self,
    _context_dir: &Path,
    image_tag: &str,
    _flags: BuildFlags,
    progress: mpsc::UnboundedSender<DaemonMessage>,
  ) -> Result<(), DaemonError> {
    self.builds.lock().unwrap().push(image_tag.to_string());
    let _ = progress.send(DaemonMessage::built("sha256:recorded"));
    Ok(())
  }
}
