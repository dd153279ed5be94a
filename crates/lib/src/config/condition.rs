//! Mapping between configuration keys and property group conditions.
//!
//! Only the two canonical shapes written by the project system are
//! recognised:
//!
//! ```text
//!  '$(Configuration)' == 'Debug'
//!  '$(Configuration)|$(Platform)' == 'Debug|AnyCPU'
//! ```
//!
//! Anything else maps to an empty key rather than an error, so hand-written
//! conditions simply do not show up as configurations.

use super::key::ConfigurationKey;

const CONFIG_LHS: &str = "'$(Configuration)'";
const CONFIG_PLATFORM_LHS: &str = "'$(Configuration)|$(Platform)'";

/// Parse a property group condition into a configuration key.
pub fn parse_condition(condition: &str) -> ConfigurationKey {
  let trimmed = condition.trim();

  if let Some(rhs) = strip_lhs(trimmed, CONFIG_PLATFORM_LHS) {
    let Some(value) = quoted(rhs) else {
      return ConfigurationKey::default();
    };
    return match value.split_once('|') {
      Some((config, platform)) => ConfigurationKey::new(config.trim(), platform.trim()),
      None => ConfigurationKey::config_only(value.trim()),
    };
  }

  if let Some(rhs) = strip_lhs(trimmed, CONFIG_LHS) {
    let Some(value) = quoted(rhs) else {
      return ConfigurationKey::default();
    };
    if value.contains('|') {
      return ConfigurationKey::default();
    }
    return ConfigurationKey::config_only(value.trim());
  }

  ConfigurationKey::default()
}

/// Render the condition that selects `key`.
pub fn to_condition(key: &ConfigurationKey) -> String {
  if key.has_platform() {
    format!(
      " {} == '{}|{}' ",
      CONFIG_PLATFORM_LHS,
      key.config(),
      key.engine_platform()
    )
  } else {
    format!(" {} == '{}' ", CONFIG_LHS, key.config())
  }
}

/// Strip `lhs` and the `==` operator, returning the remaining right-hand side.
fn strip_lhs<'a>(condition: &'a str, lhs: &str) -> Option<&'a str> {
  let rest = condition.strip_prefix(lhs)?;
  rest.trim_start().strip_prefix("==").map(str::trim)
}

/// The contents of a single-quoted string that makes up the whole input.
fn quoted(s: &str) -> Option<&str> {
  let inner = s.strip_prefix('\'')?.strip_suffix('\'')?;
  if inner.contains('\'') { None } else { Some(inner) }
}
