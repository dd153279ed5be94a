//! Build orchestration.
//!
//! Maps a build request for one configuration onto an engine submission while
//! keeping at most one build per project in flight.
//!
//! # Submodules
//!
//! - [`coordinator`] - mutual exclusion, suspend/resume and submission
//! - [`host`] - the host's shared build manager
//! - [`logger`] - build output formatting

pub mod coordinator;
pub mod host;
pub mod logger;
mod types;

pub use coordinator::{BuildCoordinator, DeferredBuild};
pub use host::{HostBuildManager, HostError, SharedHostBuildManager};
pub use logger::{IdeBuildLogger, MemorySink, OutputSink, Verbosity, WriterSink};
pub use types::*;
