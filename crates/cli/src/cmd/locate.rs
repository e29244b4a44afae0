//! `carbox locate`: list the distribution units of a workspace.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use carbox_lib::PipelineConfig;
use carbox_lib::locate::Locator;
use carbox_lib::registry::WorkspaceRegistry;

use crate::output::{self, Mark, OutputFormat};

pub fn cmd_locate(workspace: &Path, units: &[String], config: Option<&Path>, output: OutputFormat) -> Result<()> {
  let config = PipelineConfig::load(config).context("Failed to load config")?;
  let registry = Arc::new(WorkspaceRegistry::with_descriptor(workspace, config.descriptor.clone()));
  let locator = Locator::new(registry, config.marker.clone());

  let discovery = if units.is_empty() {
    locator.discover()
  } else {
    let required: BTreeSet<String> = units.iter().cloned().collect();
    locator.locate(&required)
  };

  if output.is_json() {
    return output::json(&serde_json::json!({
      "units": discovery.units,
      "warnings": discovery.warnings,
    }));
  }

  if discovery.units.is_empty() {
    output::line(Mark::Step, "No distribution units found");
  }
  for unit in &discovery.units {
    output::field(&unit.name, unit.location.display());
  }
  for warning in &discovery.warnings {
    output::line(Mark::Warn, warning);
  }

  Ok(())
}
