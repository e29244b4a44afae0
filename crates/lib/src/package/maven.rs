//! Maven-driven packaging.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Packager, PackagingError};
use crate::consts::{ARCHIVE_EXTENSION, PACKAGING_OUTPUT_DIR};
use crate::descriptor::PackageDescriptor;

/// Number of output lines kept in a failure message.
const FAILURE_TAIL_LINES: usize = 20;

/// Runs `mvn package` against a project descriptor and picks up the `.car`
/// it leaves in `target/`.
#[derive(Debug, Clone)]
pub struct MavenPackager {
  program: String,
}

impl MavenPackager {
  pub fn new(program: impl Into<String>) -> Self {
    Self { program: program.into() }
  }

  async fn expected_output(descriptor: &Path, target: &Path) -> Option<PathBuf> {
    let name = PackageDescriptor::read(descriptor).await.ok()?.archive_file_name();
    let path = target.join(name);
    let meta = tokio::fs::metadata(&path).await.ok()?;
    meta.is_file().then_some(path)
  }
}

impl Default for MavenPackager {
  fn default() -> Self {
    Self::new("mvn")
  }
}

#[async_trait]
impl Packager for MavenPackager {
  async fn package_project(&self, descriptor: &Path) -> Result<PathBuf, PackagingError> {
    let project_dir = descriptor
      .parent()
      .filter(|p| !p.as_os_str().is_empty())
      .unwrap_or(Path::new("."));

    info!(descriptor = %descriptor.display(), "packaging project");

    let output = Command::new(&self.program)
      .args(["-q", "-B", "package", "-DskipTests", "-f"])
      .arg(descriptor)
      .current_dir(project_dir)
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|source| PackagingError::Spawn {
        program: self.program.clone(),
        source,
      })?;

    if !output.status.success() {
      let stdout = String::from_utf8_lossy(&output.stdout);
      let stderr = String::from_utf8_lossy(&output.stderr);
      debug!(stdout = %stdout, stderr = %stderr, "packaging output");
      return Err(PackagingError::Failed {
        code: output.status.code(),
        message: tail(&stderr, &stdout),
      });
    }

    let target = project_dir.join(PACKAGING_OUTPUT_DIR);
    if let Some(path) = Self::expected_output(descriptor, &target).await {
      return Ok(path);
    }
    newest_archive(&target).await.ok_or(PackagingError::NoOutput(target))
  }
}

fn tail(stderr: &str, stdout: &str) -> String {
  let text = if stderr.trim().is_empty() { stdout } else { stderr };
  let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
  let start = lines.len().saturating_sub(FAILURE_TAIL_LINES);
  lines[start..].join("\n")
}

/// Most recently modified archive in `dir`.
async fn newest_archive(dir: &Path) -> Option<PathBuf> {
  let mut entries = tokio::fs::read_dir(dir).await.ok()?;
  let mut newest: Option<(SystemTime, PathBuf)> = None;

  while let Ok(Some(entry)) = entries.next_entry().await {
    let path = entry.path();
    if !path.extension().is_some_and(|ext| ext == ARCHIVE_EXTENSION) {
      continue;
    }
    let Ok(meta) = entry.metadata().await else {
      continue;
    };
    if !meta.is_file() {
      continue;
    }
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    if newest.as_ref().is_none_or(|(time, _)| modified > *time) {
      newest = Some((modified, path));
    }
  }
  newest.map(|(_, path)| path)
}
