//! Shared utilities.
//!
//! Hashing helpers and, for tests, cross-platform command snippets.

pub mod hash;

#[cfg(test)]
pub mod testutil;
