//! Test doubles for the external collaborators and workspace fixtures.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::consts::{DESCRIPTOR_FILE, DISTRIBUTION_NATURE, PROJECT_FILE};
use crate::daemon::{BuildFlags, ContainerDaemon, DaemonError, DaemonMessage, Endpoint};
use crate::package::{Packager, PackagingError};
use crate::progress::ProgressEvent;
use crate::registry::{ProjectEntry, ProjectRegistry, RegistryError};

/// Write an Eclipse-style project with the given natures, plus a `pom.xml`
/// declaring `{name}` / `1.0.0` when `with_descriptor` is set.
pub fn write_project(root: &Path, name: &str, natures: &[&str], with_descriptor: bool) -> PathBuf {
  let dir = root.join(name);
  std::fs::create_dir_all(&dir).unwrap();

  let natures: String = natures.iter().map(|n| format!("<nature>{}</nature>", n)).collect();
  std::fs::write(
    dir.join(PROJECT_FILE),
    format!(
      "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<projectDescription><name>{}</name><comment></comment><natures>{}</natures></projectDescription>\n",
      name, natures
    ),
  )
  .unwrap();

  if with_descriptor {
    std::fs::write(
      dir.join(DESCRIPTOR_FILE),
      format!(
        "<project><groupId>com.example</groupId><artifactId>{}</artifactId><version>1.0.0</version></project>",
        name
      ),
    )
    .unwrap();
  }
  dir
}

/// Collect every event until all senders are gone.
pub async fn drain(mut rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
  let mut events = Vec::new();
  while let Some(event) = rx.recv().await {
    events.push(event);
  }
  events
}

#[derive(Debug, Clone)]
pub struct FakeProject {
  pub name: String,
  pub open: bool,
  pub marker: bool,
  pub descriptor: bool,
  pub marker_fails: bool,
}

impl FakeProject {
  pub fn distribution(name: &str) -> Self {
    Self {
      name: name.to_string(),
      open: true,
      marker: true,
      descriptor: true,
      marker_fails: false,
    }
  }

  pub fn plain(name: &str) -> Self {
    Self {
      marker: false,
      ..Self::distribution(name)
    }
  }

  pub fn closed(mut self) -> Self {
    self.open = false;
    self
  }

  pub fn without_descriptor(mut self) -> Self {
    self.descriptor = false;
    self
  }

  pub fn failing_marker(mut self) -> Self {
    self.marker_fails = true;
    self
  }
}

/// In-memory registry. When rooted, each project with a descriptor gets a
/// real `pom.xml` on disk so the exporter can read it.
pub struct FakeRegistry {
  root: PathBuf,
  projects: Vec<FakeProject>,
  unavailable: bool,
}

impl FakeRegistry {
  pub fn new(projects: Vec<FakeProject>) -> Self {
    Self {
      root: PathBuf::from("/fake-workspace"),
      projects,
      unavailable: false,
    }
  }

  pub fn rooted(root: &Path, projects: Vec<FakeProject>) -> Self {
    for project in &projects {
      write_project(root, &project.name, &[DISTRIBUTION_NATURE], project.descriptor);
    }
    Self {
      root: root.to_path_buf(),
      projects,
      unavailable: false,
    }
  }

  pub fn unavailable() -> Self {
    Self {
      unavailable: true,
      ..Self::new(Vec::new())
    }
  }

  fn project(&self, name: &str) -> Option<&FakeProject> {
    self.projects.iter().find(|p| p.name == name)
  }
}

impl ProjectRegistry for FakeRegistry {
  fn list_projects(&self) -> Result<Vec<ProjectEntry>, RegistryError> {
    if self.unavailable {
      return Err(RegistryError::Read {
        path: self.root.clone(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "workspace missing"),
      });
    }
    Ok(
      self
        .projects
        .iter()
        .map(|p| ProjectEntry {
          name: p.name.clone(),
          location: self.root.join(&p.name),
        })
        .collect(),
    )
  }

  fn is_open(&self, name: &str) -> bool {
    self.project(name).is_some_and(|p| p.open)
  }

  fn has_marker(&self, name: &str, marker: &str) -> Result<bool, RegistryError> {
    let project = self
      .project(name)
      .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
    if project.marker_fails {
      return Err(RegistryError::Metadata {
        path: self.root.join(name).join(PROJECT_FILE),
        message: "corrupt project description".to_string(),
      });
    }
    Ok(project.marker && marker == DISTRIBUTION_NATURE)
  }

  fn descriptor_file(&self, name: &str) -> Option<PathBuf> {
    let project = self.project(name)?;
    project.descriptor.then(|| self.root.join(name).join(DESCRIPTOR_FILE))
  }
}

/// Packager that writes fixed bytes to `<project>/target/output.car`.
pub struct FakePackager {
  output: Result<Vec<u8>, String>,
  calls: AtomicUsize,
  last_output: Mutex<Option<PathBuf>>,
  cancel: Option<CancellationToken>,
}

impl FakePackager {
  pub fn producing(bytes: Vec<u8>) -> Self {
    Self {
      output: Ok(bytes),
      calls: AtomicUsize::new(0),
      last_output: Mutex::new(None),
      cancel: None,
    }
  }

  pub fn failing(message: &str) -> Self {
    Self {
      output: Err(message.to_string()),
      ..Self::producing(Vec::new())
    }
  }

  /// Cancel `token` while packaging, as a user would mid-run.
  pub fn cancelling(mut self, token: CancellationToken) -> Self {
    self.cancel = Some(token);
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn last_output(&self) -> Option<PathBuf> {
    self.last_output.lock().unwrap().clone()
  }
}

#[async_trait]
impl Packager for FakePackager {
  async fn package_project(&self, descriptor: &Path) -> Result<PathBuf, PackagingError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(token) = &self.cancel {
      token.cancel();
    }

    let bytes = self.output.clone().map_err(|message| PackagingError::Failed {
      code: Some(1),
      message,
    })?;
    let target = descriptor.parent().unwrap().join("target");
    std::fs::create_dir_all(&target).unwrap();
    let path = target.join("output.car");
    std::fs::write(&path, bytes).unwrap();
    *self.last_output.lock().unwrap() = Some(path.clone());
    Ok(path)
  }
}

/// Daemon that replays scripted messages.
pub struct FakeDaemon {
  endpoint: Endpoint,
  reachable: bool,
  messages: Vec<DaemonMessage>,
  failure: Option<String>,
  builds: Mutex<Vec<String>>,
  flags: Mutex<Option<BuildFlags>>,
  cancel: Option<CancellationToken>,
}

impl FakeDaemon {
  pub fn scripted(messages: Vec<DaemonMessage>) -> Self {
    Self {
      endpoint: Endpoint::current(),
      reachable: true,
      messages,
      failure: None,
      builds: Mutex::new(Vec::new()),
      flags: Mutex::new(None),
      cancel: None,
    }
  }

  pub fn succeeding(image_id: &str) -> Self {
    Self::scripted(vec![
      DaemonMessage::stream("Step 1/2 : FROM base"),
      DaemonMessage::stream("Step 2/2 : COPY carbonapps/ /home/carbonapps/"),
      DaemonMessage::built(image_id),
    ])
  }

  pub fn failing(message: &str) -> Self {
    Self {
      failure: Some(message.to_string()),
      ..Self::scripted(vec![DaemonMessage::stream("Step 1/2 : FROM base")])
    }
  }

  pub fn unreachable(mut self) -> Self {
    self.reachable = false;
    self
  }

  /// Cancel `token` once the build has started.
  pub fn cancelling(mut self, token: CancellationToken) -> Self {
    self.cancel = Some(token);
    self
  }

  pub fn build_calls(&self) -> Vec<String> {
    self.builds.lock().unwrap().clone()
  }

  pub fn last_flags(&self) -> Option<BuildFlags> {
    *self.flags.lock().unwrap()
  }
}

#[async_trait]
impl ContainerDaemon for FakeDaemon {
  fn endpoint(&self) -> &Endpoint {
    &self.endpoint
  }

  async fn ping(&self) -> Result<(), DaemonError> {
    if self.reachable {
      Ok(())
    } else {
      Err(DaemonError::Unreachable {
        endpoint: self.endpoint.to_string(),
        message: "connection refused".to_string(),
      })
    }
  }

  async fn build(
    &self,
    _context_dir: &Path,
    image_tag: &str,
    flags: BuildFlags,
    progress: mpsc::UnboundedSender<DaemonMessage>,
  ) -> Result<(), DaemonError> {
    self.builds.lock().unwrap().push(image_tag.to_string());
    *self.flags.lock().unwrap() = Some(flags);
    if let Some(token) = &self.cancel {
      token.cancel();
    }

    for message in &self.messages {
      let _ = progress.send(message.clone());
    }
    match &self.failure {
      Some(message) => Err(DaemonError::BuildFailed {
        code: Some(1),
        message: message.clone(),
      }),
      None => Ok(()),
    }
  }
}
