//! Project configurations: canonical keys, condition mapping and the registry.

mod condition;
mod key;
mod registry;

use thiserror::Error;

use crate::property::PropertyError;

pub use condition::{parse_condition, to_condition};
pub use key::{ConfigurationKey, DISPLAY_ANY_CPU, ENGINE_ANY_CPU, to_display_platform, to_engine_platform};
pub use registry::ConfigurationRegistry;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("configuration or platform '{0}' already exists")]
  AlreadyExists(String),

  #[error("configuration or platform '{0}' not found")]
  NotFound(String),

  #[error(transparent)]
  Property(#[from] PropertyError),
}
