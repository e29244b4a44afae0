//! carbox-lib: build-and-package pipeline for distribution units
//!
//! This crate turns a set of workspace projects into a container image:
//! - `locate`: finds open projects carrying the distribution marker
//! - `export`: packages each unit and stages its archive
//! - `image`: health-checks the daemon and builds the image from scratch
//! - `pipeline`: sequences the stages with progress, cancellation and an
//!   aggregated `BuildResult`

pub mod config;
pub mod consts;
pub mod daemon;
pub mod descriptor;
pub mod export;
pub mod image;
pub mod locate;
pub mod package;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod registry;
pub mod request;
pub mod util;

pub use config::PipelineConfig;
pub use pipeline::{BuildResult, BuildStatus, Pipeline, PipelineError, PipelineHandle, PipelineState};
pub use request::BuildRequest;
