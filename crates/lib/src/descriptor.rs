//! Package descriptor (`pom.xml`) parsing.
//!
//! Only the coordinates that decide the staged archive name are read:
//! `artifactId` and `version`, with the version inherited from `<parent>`
//! when the project does not declare its own.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::consts::ARCHIVE_EXTENSION;

#[derive(Debug, Error)]
pub enum DescriptorError {
  #[error("failed to read descriptor {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse descriptor {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("descriptor {path} does not declare {field}")]
  MissingField { path: PathBuf, field: &'static str },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PomParent {
  version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PomModel {
  artifact_id: Option<String>,
  version: Option<String>,
  parent: Option<PomParent>,
}

/// Coordinates of a packageable project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
  pub artifact_id: String,
  pub version: String,
}

impl PackageDescriptor {
  pub fn parse(content: &str, path: &Path) -> Result<Self, DescriptorError> {
    let model: PomModel = quick_xml::de::from_str(content).map_err(|e| DescriptorError::Parse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;

    let artifact_id = non_blank(model.artifact_id).ok_or_else(|| DescriptorError::MissingField {
      path: path.to_path_buf(),
      field: "artifactId",
    })?;
    let version = non_blank(model.version)
      .or_else(|| model.parent.and_then(|p| non_blank(p.version)))
      .ok_or_else(|| DescriptorError::MissingField {
        path: path.to_path_buf(),
        field: "version",
      })?;

    Ok(Self { artifact_id, version })
  }

  pub async fn read(path: &Path) -> Result<Self, DescriptorError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|source| DescriptorError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content, path)
  }

  /// Staged archive name, `{artifactId}_{version}.car`.
  pub fn archive_file_name(&self) -> String {
    format!("{}_{}.{}", self.artifact_id, self.version, ARCHIVE_EXTENSION)
  }
}

fn non_blank(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
