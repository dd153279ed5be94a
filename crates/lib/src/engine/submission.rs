//! Build submissions: target ordering and execution.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info, warn};

use super::eval::condition_holds;
use super::instance::ProjectInstance;
use super::manager::{EngineInner, LoggerRegistry};
use super::tasks::execute_task;
use super::types::{
  BuildEvent, Diagnostic, EngineBuildResult, EngineError, EngineLogger, OverallResult, SubmissionId, TargetOutcome,
};

/// Fans events out to the loggers attached to one submission.
pub struct Reporter {
  submission: SubmissionId,
  loggers: Vec<Arc<dyn EngineLogger>>,
}

impl Reporter {
  pub(super) fn new(submission: SubmissionId, registry: &LoggerRegistry) -> Self {
    Self {
      submission,
      loggers: registry.loggers_for(submission),
    }
  }

  pub fn submission(&self) -> SubmissionId {
    self.submission
  }

  pub fn emit(&self, event: BuildEvent) {
    for logger in &self.loggers {
      logger.on_event(&event);
    }
  }
}

/// A pending build of one instance for a list of targets.
///
/// Created by [`BuildEngine::pend_build`](super::BuildEngine::pend_build). Loggers
/// attached under [`Submission::id`] before execution receive its events.
pub struct Submission {
  id: SubmissionId,
  instance: ProjectInstance,
  targets: Vec<String>,
  engine: Arc<EngineInner>,
}

impl std::fmt::Debug for Submission {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Submission")
      .field("id", &self.id)
      .field("project", &self.instance.project_path())
      .field("targets", &self.targets)
      .finish()
  }
}

impl Submission {
  pub(super) fn new(id: SubmissionId, instance: ProjectInstance, targets: Vec<String>, engine: Arc<EngineInner>) -> Self {
    Self {
      id,
      instance,
      targets,
      engine,
    }
  }

  pub fn id(&self) -> SubmissionId {
    self.id
  }

  pub fn targets(&self) -> &[String] {
    &self.targets
  }

  /// Run the submission on the worker pool and block until it completes.
  pub fn execute(self) -> Result<EngineBuildResult, EngineError> {
    let handle = self.engine.handle()?;
    let shell = self.engine.shell().map(str::to_string);
    let reporter = Reporter::new(self.id, self.engine.loggers());
    let task = handle.spawn(run(self.instance, self.targets, reporter, shell));
    handle.block_on(task).map_err(|e| join_error(self.id, e))
  }

  /// Run the submission on the worker pool; `on_complete` is invoked on a worker thread.
  ///
  /// `on_complete` runs exactly once. A build that panics, or is cancelled by
  /// [`BuildEngine::shutdown`](super::BuildEngine::shutdown), completes with a failed result.
  pub fn execute_async<F>(self, on_complete: F) -> Result<(), EngineError>
  where
    F: FnOnce(EngineBuildResult) + Send + 'static,
  {
    let handle = self.engine.handle()?;
    let shell = self.engine.shell().map(str::to_string);
    let reporter = Reporter::new(self.id, self.engine.loggers());
    let completion = Completion::new(self.id, self.instance.clone(), on_complete);
    let task = handle.spawn(run(self.instance, self.targets, reporter, shell));
    handle.spawn(async move {
      match task.await {
        Ok(result) => completion.complete(result),
        Err(e) => {
          let error = join_error(completion.submission, e);
          warn!(submission = %completion.submission, %error, "build task ended without a result");
        }
      }
    });
    Ok(())
  }
}

fn join_error(submission: SubmissionId, e: tokio::task::JoinError) -> EngineError {
  if e.is_panic() {
    EngineError::Panicked(submission)
  } else {
    EngineError::ShutDown
  }
}

/// Delivers an async result exactly once; reports failure if dropped undelivered.
struct Completion<F: FnOnce(EngineBuildResult)> {
  submission: SubmissionId,
  instance: Option<ProjectInstance>,
  on_complete: Option<F>,
}

impl<F: FnOnce(EngineBuildResult)> Completion<F> {
  fn new(submission: SubmissionId, instance: ProjectInstance, on_complete: F) -> Self {
    Self {
      submission,
      instance: Some(instance),
      on_complete: Some(on_complete),
    }
  }

  fn complete(mut self, result: EngineBuildResult) {
    if let Some(on_complete) = self.on_complete.take() {
      on_complete(result);
    }
  }
}

impl<F: FnOnce(EngineBuildResult)> Drop for Completion<F> {
  fn drop(&mut self) {
    if let Some(on_complete) = self.on_complete.take()
      && let Some(instance) = self.instance.take()
    {
      warn!(submission = %self.submission, "build did not finish, reporting failure");
      on_complete(EngineBuildResult {
        submission: self.submission,
        overall: OverallResult::Failure,
        targets: BTreeMap::new(),
        instance,
      });
    }
  }
}

async fn run(
  mut instance: ProjectInstance,
  targets: Vec<String>,
  reporter: Reporter,
  shell: Option<String>,
) -> EngineBuildResult {
  let submission = reporter.submission();
  reporter.emit(BuildEvent::BuildStarted {
    submission,
    project: instance.project_path().to_path_buf(),
  });
  info!(%submission, project = %instance.project_path().display(), targets = ?targets, "build started");

  let mut outcomes = BTreeMap::new();
  let success = match plan_targets(&instance, &targets) {
    Ok(order) => run_targets(&order, &mut instance, &reporter, shell.as_deref(), &mut outcomes).await,
    Err(message) => {
      reporter.emit(BuildEvent::Error(Diagnostic::new(message).with_code(Some("MSB4057".into()))));
      false
    }
  };

  reporter.emit(BuildEvent::BuildFinished { submission, success });
  info!(%submission, success, "build finished");

  EngineBuildResult {
    submission,
    overall: if success {
      OverallResult::Success
    } else {
      OverallResult::Failure
    },
    targets: outcomes,
    instance,
  }
}

async fn run_targets(
  order: &[String],
  instance: &mut ProjectInstance,
  reporter: &Reporter,
  shell: Option<&str>,
  outcomes: &mut BTreeMap<String, TargetOutcome>,
) -> bool {
  for name in order {
    let Some(target) = instance.target(name).cloned() else {
      continue;
    };

    if !condition_holds(target.condition.as_deref(), instance.properties(), instance.project_dir()) {
      debug!(target = %name, "target condition false, skipping");
      reporter.emit(BuildEvent::TargetSkipped { name: name.clone() });
      outcomes.insert(name.clone(), TargetOutcome::Skipped);
      continue;
    }

    reporter.emit(BuildEvent::TargetStarted { name: name.clone() });
    let mut success = true;
    for spec in &target.tasks {
      if !condition_holds(spec.condition.as_deref(), instance.properties(), instance.project_dir()) {
        continue;
      }
      if !execute_task(&spec.task, instance, reporter, shell).await {
        success = false;
        break;
      }
    }
    reporter.emit(BuildEvent::TargetFinished {
      name: name.clone(),
      success,
    });

    if !success {
      outcomes.insert(name.clone(), TargetOutcome::Failure);
      return false;
    }
    outcomes.insert(name.clone(), TargetOutcome::Success);
  }
  true
}

/// Order the requested targets and everything they depend on.
///
/// Each target appears once, after all of its dependencies. An empty request
/// means the project's default targets, or its first target when it declares none.
pub(super) fn plan_targets(instance: &ProjectInstance, requested: &[String]) -> Result<Vec<String>, String> {
  let mut roots: Vec<String> = if requested.is_empty() {
    instance.default_targets().to_vec()
  } else {
    requested.to_vec()
  };
  if roots.is_empty() {
    roots.extend(instance.target_names().next().map(str::to_string));
  }

  let mut graph: DiGraph<String, ()> = DiGraph::new();
  let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
  let mut visited = HashSet::new();
  let mut stack: Vec<String> = Vec::new();

  let mut node_for = |graph: &mut DiGraph<String, ()>, name: &str| -> NodeIndex {
    *nodes
      .entry(name.to_ascii_lowercase())
      .or_insert_with(|| graph.add_node(name.to_string()))
  };

  for root in &roots {
    if !instance.has_target(root) {
      return Err(format!(
        "The target \"{root}\" does not exist in the project \"{}\".",
        instance.project_path().display()
      ));
    }
    node_for(&mut graph, root);
    stack.push(root.clone());
  }

  while let Some(name) = stack.pop() {
    if !visited.insert(name.to_ascii_lowercase()) {
      continue;
    }
    let Some(target) = instance.target(&name) else {
      return Err(format!("The target \"{name}\" does not exist in the project."));
    };
    let dependent = node_for(&mut graph, &name);
    for dep in &target.depends_on {
      let dependency = node_for(&mut graph, dep);
      graph.add_edge(dependency, dependent, ());
      stack.push(dep.clone());
    }
  }

  let sorted = toposort(&graph, None).map_err(|cycle| {
    format!(
      "There is a circular dependency in the target dependency graph involving target \"{}\".",
      graph[cycle.node_id()]
    )
  })?;
  Ok(sorted.into_iter().map(|idx| graph[idx].clone()).collect())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::project::{ProjectFile, TargetDef};
  use crate::engine::properties::PropertyMap;
  use crate::engine::eval::evaluate;
  use crate::engine::{BuildEngine, EngineOptions};
  use std::path::Path;
  use std::time::Duration;

  fn instance_with(targets: &[(&str, &[&str])], defaults: &[&str]) -> ProjectInstance {
    let mut file = ProjectFile::default();
    for (name, deps) in targets {
      file.targets.insert(
        name.to_string(),
        TargetDef {
          depends_on: deps.iter().map(|d| d.to_string()).collect(),
          ..Default::default()
        },
      );
    }
    file.default_targets = defaults.iter().map(|d| d.to_string()).collect();
    evaluate(Path::new("/proj/app.json"), &file, &PropertyMap::new())
  }

  #[test]
  fn dependencies_run_before_dependents() {
    let inst = instance_with(&[("Build", &["Compile", "Prepare"]), ("Compile", &["Prepare"]), ("Prepare", &[])], &[]);
    let order = plan_targets(&inst, &["Build".to_string()]).unwrap();
    assert_eq!(order, vec!["Prepare", "Compile", "Build"]);
  }

  #[test]
  fn empty_request_uses_default_targets() {
    let inst = instance_with(&[("Build", &[]), ("Pack", &[])], &["Pack"]);
    assert_eq!(plan_targets(&inst, &[]).unwrap(), vec!["Pack"]);
  }

  #[test]
  fn missing_target_is_reported() {
    let inst = instance_with(&[("Build", &[])], &[]);
    let err = plan_targets(&inst, &["Publish".to_string()]).unwrap_err();
    assert!(err.contains("Publish"));
  }

  #[test]
  fn cycles_are_reported() {
    let inst = instance_with(&[("A", &["B"]), ("B", &["A"])], &[]);
    let err = plan_targets(&inst, &["A".to_string()]).unwrap_err();
    assert!(err.contains("circular"));
  }

  struct PanickingLogger;

  impl EngineLogger for PanickingLogger {
    fn on_event(&self, _event: &BuildEvent) {
      panic!("logger failure");
    }
  }

  fn engine() -> BuildEngine {
    BuildEngine::new(EngineOptions {
      worker_threads: Some(1),
      shell: None,
    })
    .unwrap()
  }

  #[test]
  fn panicking_async_build_still_completes_once() {
    let engine = engine();
    let submission = engine.pend_build(instance_with(&[("Build", &[])], &["Build"]), &[]).unwrap();
    engine.attach_logger(submission.id(), Arc::new(PanickingLogger));

    let (tx, rx) = std::sync::mpsc::channel();
    submission
      .execute_async(move |result| tx.send(result.overall).unwrap())
      .unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), OverallResult::Failure);
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
  }

  #[test]
  fn panicking_sync_build_is_an_error() {
    let engine = engine();
    let submission = engine.pend_build(instance_with(&[("Build", &[])], &["Build"]), &[]).unwrap();
    let id = submission.id();
    engine.attach_logger(id, Arc::new(PanickingLogger));
    assert!(matches!(submission.execute(), Err(EngineError::Panicked(p)) if p == id));
  }
}
