//! Artifact exporter: packages a unit and stages its archive.
//!
//! The staged file name comes from the unit's descriptor
//! (`{artifactId}_{version}.car`), never from the project name. Two units
//! with the same coordinates land on the same file and the last one wins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::descriptor::{DescriptorError, PackageDescriptor};
use crate::locate::Unit;
use crate::package::{Packager, PackagingError};
use crate::registry::ProjectRegistry;
use crate::util::hash::{ContentHash, hash_file};

/// Why a unit could not be exported.
#[derive(Debug, Error)]
pub enum ExportFailure {
  #[error("project does not expose a package descriptor")]
  MissingDescriptor,

  #[error(transparent)]
  Descriptor(#[from] DescriptorError),

  #[error(transparent)]
  Packaging(#[from] PackagingError),

  #[error("failed to stage {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Error)]
#[error("failed to export {unit}: {reason}")]
pub struct ExportError {
  pub unit: String,
  #[source]
  pub reason: ExportFailure,
}

/// A unit's archive after it has been copied into the staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedArtifact {
  pub unit: String,
  pub path: PathBuf,
  pub size: u64,
  pub digest: ContentHash,
}

pub struct Exporter {
  registry: Arc<dyn ProjectRegistry>,
  packager: Arc<dyn Packager>,
}

impl Exporter {
  pub fn new(registry: Arc<dyn ProjectRegistry>, packager: Arc<dyn Packager>) -> Self {
    Self { registry, packager }
  }

  /// Package `unit` and copy its archive into `destination_dir`.
  pub async fn export(&self, unit: &Unit, destination_dir: &Path) -> Result<ExportedArtifact, ExportError> {
    self
      .export_inner(unit, destination_dir)
      .await
      .map_err(|reason| ExportError {
        unit: unit.name.clone(),
        reason,
      })
  }

  async fn export_inner(&self, unit: &Unit, destination_dir: &Path) -> Result<ExportedArtifact, ExportFailure> {
    let descriptor_path = self
      .registry
      .descriptor_file(&unit.name)
      .ok_or(ExportFailure::MissingDescriptor)?;
    let descriptor = PackageDescriptor::read(&descriptor_path).await?;
    let file_name = descriptor.archive_file_name();

    let archive = self.packager.package_project(&descriptor_path).await?;
    debug!(unit = %unit.name, archive = %archive.display(), "packaging produced archive");

    let destination = destination_dir.join(&file_name);
    stage(&archive, destination_dir, &destination).await?;

    let size = fs::metadata(&destination).await.map_err(|source| io_error(&destination, source))?.len();
    let digest_path = destination.clone();
    let digest = tokio::task::spawn_blocking(move || hash_file(&digest_path))
      .await
      .map_err(|e| io_error(&destination, std::io::Error::other(e)))?
      .map_err(|source| io_error(&destination, source))?;

    info!(
      unit = %unit.name,
      dest = %destination.display(),
      size,
      digest = %digest.short(),
      "exported archive"
    );

    Ok(ExportedArtifact {
      unit: unit.name.clone(),
      path: destination,
      size,
      digest,
    })
  }
}

/// Copy `archive` to `destination`, replacing any earlier staged copy.
async fn stage(archive: &Path, destination_dir: &Path, destination: &Path) -> Result<(), ExportFailure> {
  fs::create_dir_all(destination_dir)
    .await
    .map_err(|source| io_error(destination_dir, source))?;

  match fs::remove_file(destination).await {
    Ok(()) => debug!(dest = %destination.display(), "replaced previously staged archive"),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(source) => return Err(io_error(destination, source)),
  }

  fs::copy(archive, destination)
    .await
    .map_err(|source| io_error(destination, source))?;
  Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> ExportFailure {
  ExportFailure::Io {
    path: path.to_path_buf(),
    source,
  }
}
