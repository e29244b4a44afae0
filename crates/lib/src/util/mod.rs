//! Shared utilities.
//!
//! Content hashing for staged archives, and test doubles for the crate's
//! unit tests.

pub mod hash;

#[cfg(test)]
pub mod testutil;
