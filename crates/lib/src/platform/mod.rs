//! Host detection and per-host directory conventions.

pub mod os;
pub mod paths;

pub use os::{HostFamily, Os};
