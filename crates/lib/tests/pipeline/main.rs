//! End-to-end pipeline tests against a workspace on disk.

mod common;

mod cancel_tests;
#[cfg(unix)]
mod tooling_tests;
