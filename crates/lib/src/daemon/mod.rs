//! Container daemon surface.
//!
//! The image builder reaches the daemon only through [`ContainerDaemon`].
//! [`DockerCli`] implements it by driving the `docker` binary against the
//! endpoint picked by [`Endpoint::for_host`].

mod docker;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::platform::HostFamily;

pub use docker::DockerCli;

pub const UNIX_DEFAULT_ENDPOINT: &str = "unix:///var/run/docker.sock";
pub const WINDOWS_DEFAULT_ENDPOINT: &str = "npipe:////./pipe/docker_engine";

/// Address of the container daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint(String);

impl Endpoint {
  /// Fixed default for the host family; there is no user override.
  pub fn for_host(family: HostFamily) -> Self {
    match family {
      HostFamily::Windows => Self(WINDOWS_DEFAULT_ENDPOINT.to_string()),
      HostFamily::Unix => Self(UNIX_DEFAULT_ENDPOINT.to_string()),
    }
  }

  pub fn current() -> Self {
    Self::for_host(HostFamily::current())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Build switches passed to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildFlags {
  /// Ignore the layer cache.
  pub no_cache: bool,
  /// Remove intermediate containers even when the build fails.
  pub force_rm: bool,
}

impl BuildFlags {
  /// Every build is from scratch and leaves no intermediate containers behind.
  pub fn from_scratch() -> Self {
    Self {
      no_cache: true,
      force_rm: true,
    }
  }
}

/// One progress message from the daemon while a build runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DaemonMessage {
  /// Build output text.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stream: Option<String>,
  /// Set on the terminal success message.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_id: Option<String>,
  /// Set when the daemon reports a build failure.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl DaemonMessage {
  pub fn stream(text: impl Into<String>) -> Self {
    Self {
      stream: Some(text.into()),
      ..Self::default()
    }
  }

  pub fn built(image_id: impl Into<String>) -> Self {
    Self {
      image_id: Some(image_id.into()),
      ..Self::default()
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      error: Some(message.into()),
      ..Self::default()
    }
  }
}

#[derive(Debug, Error)]
pub enum DaemonError {
  #[error("daemon at {endpoint} is unreachable: {message}")]
  Unreachable { endpoint: String, message: String },

  #[error("failed to launch {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("build failed with exit code {code:?}: {message}")]
  BuildFailed { code: Option<i32>, message: String },

  #[error("daemon i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("wait for daemon interrupted: {0}")]
  Interrupted(String),
}

/// External container daemon collaborator.
#[async_trait]
pub trait ContainerDaemon: Send + Sync {
  /// Endpoint this client talks to.
  fn endpoint(&self) -> &Endpoint;

  /// Health check.
  async fn ping(&self) -> Result<(), DaemonError>;

  /// Build `context_dir` into an image tagged `image_tag`.
  ///
  /// Progress messages are sent on `progress` as they arrive; a successful
  /// build ends with a message carrying the image id. The sender is dropped
  /// when the call returns.
  async fn build(
    &self,
    context_dir: &Path,
    image_tag: &str,
    flags: BuildFlags,
    progress: mpsc::UnboundedSender<DaemonMessage>,
  ) -> Result<(), DaemonError>;
}
