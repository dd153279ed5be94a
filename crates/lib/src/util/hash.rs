//! Hashing utilities for snapshot fingerprints and file comparison.
//!
//! This module provides:
//! - `Fingerprint`: a truncated SHA-256 of a serialized value
//! - `hash_file()`: full SHA-256 of a file's contents

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::consts::FINGERPRINT_PREFIX_LEN;

/// A truncated content hash identifying an evaluated snapshot.
///
/// # Format
///
/// Lowercase hexadecimal, [`FINGERPRINT_PREFIX_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub String);

impl std::fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Fingerprint the JSON serialization of `value`.
pub fn fingerprint<T: Serialize>(value: &T) -> Fingerprint {
  // Plain structs of strings serialize infallibly.
  let serialized = serde_json::to_vec(value).unwrap_or_default();
  let full = hash_bytes(&serialized);
  Fingerprint(full[..FINGERPRINT_PREFIX_LEN].to_string())
}

/// Full 64-character SHA-256 of arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}

/// Full 64-character SHA-256 of a file's contents.
pub fn hash_file(path: &Path) -> io::Result<String> {
  let mut file = fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hex::encode(hasher.finalize()))
}
