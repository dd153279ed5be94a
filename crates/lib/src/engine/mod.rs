//! In-process build engine.
//!
//! Evaluates JSON project files into immutable [`ProjectInstance`] snapshots
//! and runs their targets on a worker pool. The rest of the crate talks to the
//! engine only through [`Project`], [`ProjectInstance`], [`BuildEngine`] and
//! [`Submission`].

mod eval;
mod instance;
mod manager;
mod project;
mod properties;
mod submission;
mod tasks;
mod types;

pub use eval::{ConditionError, condition_holds, evaluate, evaluate_condition, expand};
pub use instance::{ItemInstance, NodeAffinity, ProjectInstance};
pub use manager::{BuildEngine, EngineOptions, LoggerRegistry};
pub use project::{Importance, ItemDef, Project, ProjectFile, PropertyGroup, TargetDef, Task, TaskSpec};
pub use properties::{PropertyList, PropertyMap};
pub use submission::{Reporter, Submission};
pub use tasks::get_shell;
pub use types::{
  BuildEvent, Diagnostic, EngineBuildResult, EngineError, EngineLogger, OverallResult, SubmissionId, TargetOutcome,
};
