//! Filesystem-backed registry over an Eclipse-style workspace.
//!
//! Every immediate subdirectory of the workspace root that holds a
//! `.project` file is a project. Names listed in the root's `.closed` file
//! are treated as closed projects.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Deserialize;
use tracing::{debug, trace};

use super::{ProjectEntry, ProjectRegistry, RegistryError};
use crate::consts::{CLOSED_PROJECTS_FILE, DESCRIPTOR_FILE, PROJECT_FILE};

#[derive(Debug, Default, Deserialize)]
struct Natures {
  #[serde(default)]
  nature: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectDescription {
  name: Option<String>,
  natures: Option<Natures>,
}

impl ProjectDescription {
  fn read(project_file: &Path) -> Result<Self, RegistryError> {
    let content = std::fs::read_to_string(project_file).map_err(|source| RegistryError::Read {
      path: project_file.to_path_buf(),
      source,
    })?;
    quick_xml::de::from_str(&content).map_err(|e| RegistryError::Metadata {
      path: project_file.to_path_buf(),
      message: e.to_string(),
    })
  }

  fn has_nature(&self, marker: &str) -> bool {
    self
      .natures
      .as_ref()
      .is_some_and(|n| n.nature.iter().any(|nature| nature.trim() == marker))
  }
}

pub struct WorkspaceRegistry {
  root: PathBuf,
  descriptor: String,
  index: RwLock<HashMap<String, PathBuf>>,
}

impl WorkspaceRegistry {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self::with_descriptor(root, DESCRIPTOR_FILE)
  }

  pub fn with_descriptor(root: impl Into<PathBuf>, descriptor: impl Into<String>) -> Self {
    let root = root.into();
    let root = dunce::canonicalize(&root).unwrap_or(root);
    Self {
      root,
      descriptor: descriptor.into(),
      index: RwLock::new(HashMap::new()),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn closed_projects(&self) -> BTreeSet<String> {
    let Ok(content) = std::fs::read_to_string(self.root.join(CLOSED_PROJECTS_FILE)) else {
      return BTreeSet::new();
    };
    content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty() && !line.starts_with('#'))
      .map(String::from)
      .collect()
  }

  fn location(&self, name: &str) -> Option<PathBuf> {
    if let Some(path) = self.index.read().ok()?.get(name) {
      return Some(path.clone());
    }
    // Not indexed yet: rescan once.
    self.list_projects().ok()?;
    self.index.read().ok()?.get(name).cloned()
  }

  fn scan(&self) -> Result<Vec<ProjectEntry>, RegistryError> {
    let entries = std::fs::read_dir(&self.root).map_err(|source| RegistryError::Read {
      path: self.root.clone(),
      source,
    })?;

    let mut dirs: Vec<PathBuf> = entries
      .filter_map(|e| e.ok())
      .map(|e| e.path())
      .filter(|p| p.is_dir() && p.join(PROJECT_FILE).is_file())
      .collect();
    dirs.sort();

    let mut projects = Vec::with_capacity(dirs.len());
    for location in dirs {
      let dir_name = location
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
      // A broken .project still lists the project; it just won't count as open.
      let name = match ProjectDescription::read(&location.join(PROJECT_FILE)) {
        Ok(desc) => desc.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        Err(e) => {
          debug!(project = %dir_name, error = %e, "unreadable project metadata");
          None
        }
      }
      .unwrap_or(dir_name);
      trace!(project = %name, location = ?location, "found project");
      projects.push(ProjectEntry { name, location });
    }
    Ok(projects)
  }
}

impl ProjectRegistry for WorkspaceRegistry {
  fn list_projects(&self) -> Result<Vec<ProjectEntry>, RegistryError> {
    let projects = self.scan()?;
    if let Ok(mut index) = self.index.write() {
      index.clear();
      // First directory wins; the locator reports the others.
      for project in &projects {
        index.entry(project.name.clone()).or_insert_with(|| project.location.clone());
      }
    }
    Ok(projects)
  }

  fn is_open(&self, name: &str) -> bool {
    if self.closed_projects().contains(name) {
      return false;
    }
    self
      .location(name)
      .is_some_and(|location| ProjectDescription::read(&location.join(PROJECT_FILE)).is_ok())
  }

  fn has_marker(&self, name: &str, marker: &str) -> Result<bool, RegistryError> {
    let location = self
      .location(name)
      .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
    let description = ProjectDescription::read(&location.join(PROJECT_FILE))?;
    Ok(description.has_nature(marker))
  }

  fn descriptor_file(&self, name: &str) -> Option<PathBuf> {
    let path = self.location(name)?.join(&self.descriptor);
    path.is_file().then_some(path)
  }
}
