//! Terminal rendering for carbox.
//!
//! Three kinds of output go through here: stage headers and per-unit export
//! lines while the pipeline runs, raw daemon output in verbose mode, and the
//! closing build summary. Problems go to stderr, everything else to stdout.

use std::fmt::Display;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use carbox_lib::export::ExportedArtifact;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// Leading glyph of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
  Ok,
  Fail,
  Warn,
  Step,
}

impl Mark {
  fn glyph(self) -> &'static str {
    match self {
      Mark::Ok => "✓",
      Mark::Fail => "✗",
      Mark::Warn => "!",
      Mark::Step => "•",
    }
  }
}

/// One status line. Failures and warnings go to stderr in their colour.
pub fn line(mark: Mark, message: impl Display) {
  let glyph = mark.glyph();
  let message = message.to_string();
  match mark {
    Mark::Ok => println!("{} {}", glyph.if_supports_color(Stream::Stdout, |s| s.green()), message),
    Mark::Step => println!("{} {}", glyph.if_supports_color(Stream::Stdout, |s| s.blue()), message),
    Mark::Warn => eprintln!(
      "{} {}",
      glyph.if_supports_color(Stream::Stderr, |s| s.yellow()),
      message.if_supports_color(Stream::Stderr, |s| s.yellow())
    ),
    Mark::Fail => eprintln!(
      "{} {}",
      glyph.if_supports_color(Stream::Stderr, |s| s.red()),
      message.if_supports_color(Stream::Stderr, |s| s.red())
    ),
  }
}

/// Header printed when the pipeline enters a stage.
pub fn stage(title: &str) {
  line(Mark::Step, title);
}

/// `  ✓ core-app  core-app_1.0.0.car  12.3 KiB  sha256:0a1b2c3d4e5f`
pub fn exported(artifact: &ExportedArtifact) {
  println!(
    "  {} {}",
    Mark::Ok.glyph().if_supports_color(Stream::Stdout, |s| s.green()),
    export_summary(artifact)
  );
}

fn export_summary(artifact: &ExportedArtifact) -> String {
  let file = artifact
    .path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| artifact.path.display().to_string());
  format!(
    "{}  {}  {}  sha256:{}",
    artifact.unit,
    file,
    human_size(artifact.size),
    artifact.digest.short()
  )
}

/// A unit the exporter gave up on; the run carries on without it.
pub fn export_failed(unit: &str, reason: &str) {
  line(Mark::Warn, format!("{}: {}", unit, reason));
}

/// Raw daemon output, indented under the current stage.
pub fn daemon_line(text: &str) {
  println!("    {}", text.if_supports_color(Stream::Stdout, |s| s.dimmed()));
}

/// Labelled value in a summary or info block.
pub fn field(label: &str, value: impl Display) {
  let label = format!("{:<20}", format!("{}:", label));
  println!("  {} {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Binary-prefixed size, one decimal above a KiB.
pub fn human_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut value = bytes as f64 / 1024.0;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", value, UNITS[unit])
}

/// Wall-clock time of a run, rounded to milliseconds.
pub fn elapsed(duration: Duration) -> String {
  let rounded = Duration::from_millis(duration.as_millis() as u64);
  humantime::format_duration(rounded).to_string()
}
