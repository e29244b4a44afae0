//! Artifact locator: finds the distribution units a run should export.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::registry::{ProjectRegistry, RegistryError};

/// A discoverable, packageable project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
  pub name: String,
  pub location: PathBuf,
  /// Carries the distribution marker.
  pub distribution: bool,
}

/// Non-fatal problem hit while scanning the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryWarning {
  /// Project the problem belongs to, `None` when the scan itself failed.
  pub project: Option<String>,
  pub message: String,
}

impl std::fmt::Display for DiscoveryWarning {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self.project {
      Some(project) => write!(f, "{}: {}", project, self.message),
      None => write!(f, "{}", self.message),
    }
  }
}

/// Outcome of a registry scan.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
  /// Qualifying units in discovery order.
  pub units: Vec<Unit>,
  pub warnings: Vec<DiscoveryWarning>,
}

pub struct Locator {
  registry: Arc<dyn ProjectRegistry>,
  marker: String,
}

impl Locator {
  pub fn new(registry: Arc<dyn ProjectRegistry>, marker: impl Into<String>) -> Self {
    Self {
      registry,
      marker: marker.into(),
    }
  }

  /// Every open project that exposes a descriptor and carries the marker.
  ///
  /// A failing marker check skips that project and is recorded as a warning.
  /// Names are lookup keys, so a project reusing an earlier project's name
  /// is skipped with a warning too.
  pub fn discover(&self) -> Discovery {
    let mut discovery = Discovery::default();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    let projects = match self.registry.list_projects() {
      Ok(projects) => projects,
      Err(e) => {
        warn!(error = %e, "failed to list projects");
        discovery.warnings.push(DiscoveryWarning {
          project: None,
          message: e.to_string(),
        });
        return discovery;
      }
    };

    for project in projects {
      if let Some(first) = seen.get(&project.name) {
        warn!(
          project = %project.name,
          location = %project.location.display(),
          first = %first.display(),
          "skipping project with duplicate name"
        );
        discovery.warnings.push(DiscoveryWarning {
          project: Some(project.name.clone()),
          message: format!(
            "duplicate project name at {}, already found at {}",
            project.location.display(),
            first.display()
          ),
        });
        continue;
      }
      seen.insert(project.name.clone(), project.location.clone());

      if !self.registry.is_open(&project.name) {
        debug!(project = %project.name, "skipping closed project");
        continue;
      }
      if self.registry.descriptor_file(&project.name).is_none() {
        debug!(project = %project.name, "skipping project without descriptor");
        continue;
      }
      match self.registry.has_marker(&project.name, &self.marker) {
        Ok(true) => discovery.units.push(Unit {
          name: project.name,
          location: project.location,
          distribution: true,
        }),
        Ok(false) => debug!(project = %project.name, "skipping project without distribution marker"),
        Err(e) => {
          warn!(project = %project.name, error = %e, "failed to check project nature");
          discovery.warnings.push(warning_for(&project.name, &e));
        }
      }
    }

    debug!(units = discovery.units.len(), "discovered distribution units");
    discovery
  }

  /// Keep only units whose name was requested, preserving discovery order.
  pub fn filter(&self, units: Vec<Unit>, required: &BTreeSet<String>) -> Vec<Unit> {
    let selected: Vec<Unit> = units.into_iter().filter(|u| required.contains(&u.name)).collect();

    for name in required {
      if !selected.iter().any(|u| &u.name == name) {
        warn!(unit = %name, "required unit not found among distribution projects");
      }
    }
    selected
  }

  /// Discover and filter in one go.
  pub fn locate(&self, required: &BTreeSet<String>) -> Discovery {
    let discovery = self.discover();
    Discovery {
      units: self.filter(discovery.units, required),
      warnings: discovery.warnings,
    }
  }
}

fn warning_for(project: &str, error: &RegistryError) -> DiscoveryWarning {
  DiscoveryWarning {
    project: Some(project.to_string()),
    message: error.to_string(),
  }
}
