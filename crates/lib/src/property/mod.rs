//! Project properties: the store, the edit gate and typed options.

mod gate;
mod options;
mod store;

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

pub use gate::{AllowAllEdits, EditGate, ReadOnlyGate};
pub use options::{OutputType, ProjectOptions, parse_address, parse_bool};
pub use store::{ChangeScope, PropertyListener, PropertyStore};

#[derive(Debug, Error)]
pub enum PropertyError {
  /// The query-edit gate refused the write.
  #[error("editing {} was denied", .path.display())]
  EditDenied { path: PathBuf },

  #[error(transparent)]
  Engine(#[from] EngineError),
}
