//! Canonical configuration names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Platform name as the build engine spells it.
pub const ENGINE_ANY_CPU: &str = "AnyCPU";

/// Platform name as it is displayed and stored in keys.
pub const DISPLAY_ANY_CPU: &str = "Any CPU";

/// An immutable `(configuration, platform)` pair.
///
/// The platform is held in display form: `AnyCPU` becomes `Any CPU`, and is
/// converted back by [`ConfigurationKey::engine_platform`]. Equality and
/// hashing compare both fields ordinally, so `Debug` and `debug` are distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigurationKey {
  config: String,
  platform: String,
}

impl ConfigurationKey {
  pub fn new(config: impl Into<String>, platform: impl Into<String>) -> Self {
    let platform = platform.into();
    Self {
      config: config.into(),
      platform: to_display_platform(&platform),
    }
  }

  /// A key without a platform component.
  pub fn config_only(config: impl Into<String>) -> Self {
    Self {
      config: config.into(),
      platform: String::new(),
    }
  }

  pub fn config(&self) -> &str {
    &self.config
  }

  pub fn platform(&self) -> &str {
    &self.platform
  }

  /// Platform in the form emitted as a build engine property value.
  pub fn engine_platform(&self) -> String {
    to_engine_platform(&self.platform)
  }

  /// True for the key produced by an unrecognised condition.
  pub fn is_empty(&self) -> bool {
    self.config.is_empty() && self.platform.is_empty()
  }

  pub fn has_platform(&self) -> bool {
    !self.platform.is_empty()
  }

  /// A new key with the configuration name replaced.
  pub fn with_config(&self, config: impl Into<String>) -> Self {
    Self {
      config: config.into(),
      platform: self.platform.clone(),
    }
  }

  /// A new key with the platform replaced.
  pub fn with_platform(&self, platform: impl Into<String>) -> Self {
    Self::new(self.config.clone(), platform)
  }
}

impl fmt::Display for ConfigurationKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.platform.is_empty() {
      write!(f, "{}", self.config)
    } else {
      write!(f, "{}|{}", self.config, self.platform)
    }
  }
}

impl FromStr for ConfigurationKey {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s.split_once('|') {
      Some((config, platform)) => Self::new(config.trim(), platform.trim()),
      None => Self::config_only(s.trim()),
    })
  }
}

impl Serialize for ConfigurationKey {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for ConfigurationKey {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    // Infallible
    Ok(raw.parse().unwrap_or_default())
  }
}

pub fn to_display_platform(platform: &str) -> String {
  if platform.eq_ignore_ascii_case(ENGINE_ANY_CPU) {
    DISPLAY_ANY_CPU.to_string()
  } else {
    platform.to_string()
  }
}

pub fn to_engine_platform(platform: &str) -> String {
  if platform.eq_ignore_ascii_case(DISPLAY_ANY_CPU) {
    ENGINE_ANY_CPU.to_string()
  } else {
    platform.to_string()
  }
}
