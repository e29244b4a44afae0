//! `docker` CLI client.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::{BuildFlags, ContainerDaemon, DaemonError, DaemonMessage, Endpoint};

/// Number of stderr lines kept in a failure message.
const FAILURE_TAIL_LINES: usize = 15;

/// Talks to the daemon by running the `docker` binary with `--host`.
///
/// Each call spawns its own process, so no connection outlives a call.
#[derive(Debug, Clone)]
pub struct DockerCli {
  program: String,
  endpoint: Endpoint,
}

impl DockerCli {
  pub fn new(program: impl Into<String>, endpoint: Endpoint) -> Self {
    Self {
      program: program.into(),
      endpoint,
    }
  }

  fn command(&self) -> Command {
    let mut command = Command::new(&self.program);
    command.arg("--host").arg(self.endpoint.as_str()).kill_on_drop(true);
    command
  }

  fn spawn_error(&self, source: std::io::Error) -> DaemonError {
    DaemonError::Spawn {
      program: self.program.clone(),
      source,
    }
  }
}

impl Default for DockerCli {
  fn default() -> Self {
    Self::new("docker", Endpoint::current())
  }
}

#[async_trait]
impl ContainerDaemon for DockerCli {
  fn endpoint(&self) -> &Endpoint {
    &self.endpoint
  }

  async fn ping(&self) -> Result<(), DaemonError> {
    let output = self
      .command()
      .args(["version", "--format", "{{.Server.Version}}"])
      .stdin(Stdio::null())
      .output()
      .await
      .map_err(|e| self.spawn_error(e))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(DaemonError::Unreachable {
        endpoint: self.endpoint.to_string(),
        message: stderr.trim().to_string(),
      });
    }

    let version = String::from_utf8_lossy(&output.stdout);
    debug!(endpoint = %self.endpoint, version = %version.trim(), "daemon reachable");
    Ok(())
  }

  async fn build(
    &self,
    context_dir: &Path,
    image_tag: &str,
    flags: BuildFlags,
    progress: mpsc::UnboundedSender<DaemonMessage>,
  ) -> Result<(), DaemonError> {
    let scratch = tempfile::Builder::new().prefix("carbox-build-").tempdir()?;
    let iid_file = scratch.path().join("image-id");

    let mut command = self.command();
    command.arg("build");
    if flags.no_cache {
      command.arg("--no-cache");
    }
    if flags.force_rm {
      command.arg("--force-rm");
    }
    command
      .arg("--iidfile")
      .arg(&iid_file)
      .arg("--tag")
      .arg(image_tag)
      .arg(context_dir)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());

    info!(context = %context_dir.display(), tag = %image_tag, endpoint = %self.endpoint, "starting image build");

    let mut child = command.spawn().map_err(|e| self.spawn_error(e))?;
    let stdout = child.stdout.take().map(|out| tokio::spawn(forward_lines(out, progress.clone())));
    let stderr = child.stderr.take().map(|err| tokio::spawn(forward_lines(err, progress.clone())));

    let status = child
      .wait()
      .await
      .map_err(|e| DaemonError::Interrupted(e.to_string()))?;

    let mut seen_id = None;
    let mut stderr_tail = Vec::new();
    for (handle, is_stderr) in [(stdout, false), (stderr, true)] {
      let Some(handle) = handle else { continue };
      let lines = handle.await.map_err(|e| DaemonError::Interrupted(e.to_string()))??;
      if seen_id.is_none() {
        seen_id = lines.image_id;
      }
      if is_stderr {
        stderr_tail = lines.tail;
      }
    }

    if !status.success() {
      return Err(DaemonError::BuildFailed {
        code: status.code(),
        message: stderr_tail.join("\n"),
      });
    }

    let image_id = match tokio::fs::read_to_string(&iid_file).await {
      Ok(content) if !content.trim().is_empty() => Some(content.trim().to_string()),
      _ => seen_id,
    };
    if let Some(id) = image_id {
      // The receiver going away only means nobody is listening any more.
      let _ = progress.send(DaemonMessage::built(id));
    }
    Ok(())
  }
}

#[derive(Debug, Default)]
struct ForwardedLines {
  image_id: Option<String>,
  tail: Vec<String>,
}

/// Forward every line of `reader` until EOF. Bytes that are not valid UTF-8
/// are replaced rather than treated as a read error, so the pipe is always
/// drained.
async fn forward_lines<R>(reader: R, progress: mpsc::UnboundedSender<DaemonMessage>) -> std::io::Result<ForwardedLines>
where
  R: AsyncRead + Unpin,
{
  let mut reader = BufReader::new(reader);
  let mut buf = Vec::new();
  let mut tail = VecDeque::with_capacity(FAILURE_TAIL_LINES + 1);
  let mut image_id = None;

  loop {
    buf.clear();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
      break;
    }
    let line = String::from_utf8_lossy(&buf).trim_end_matches(['\n', '\r']).to_string();
    trace!(line = %line, "build output");
    if let Some(id) = parse_image_id(&line) {
      image_id = Some(id);
    }
    tail.push_back(line.clone());
    if tail.len() > FAILURE_TAIL_LINES {
      tail.pop_front();
    }
    let _ = progress.send(DaemonMessage::stream(line));
  }

  Ok(ForwardedLines {
    image_id,
    tail: tail.into(),
  })
}

/// Image id announced in a line of build output, for both the classic
/// builder and BuildKit.
fn parse_image_id(line: &str) -> Option<String> {
  let line = line.trim();
  if let Some(rest) = line.strip_prefix("Successfully built ") {
    return rest.split_whitespace().next().map(String::from);
  }
  let (_, rest) = line.split_once("writing image ")?;
  rest
    .split_whitespace()
    .next()
    .filter(|id| id.starts_with("sha256:"))
    .map(String::from)
}
