//! Build coordination through a loaded project.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use projsys_lib::build::{BuildError, BuildOutcome, HostBuildManager, SharedHostBuildManager};
use projsys_lib::output::OutputError;
use projsys_lib::project::ProjectError;

use super::common::{TestEnv, debug, release};

const WAIT: Duration = Duration::from_secs(10);

#[test]
fn sync_build_runs_default_targets() {
  let env = TestEnv::from_fixture("app.projsys.json");

  let result = env.node.build(&debug(), None).unwrap();
  assert!(result.is_successful());
  assert!(env.output.contains("building Debug"));
  assert!(env.output.contains("Build succeeded."));
  assert!(!env.node.build_in_progress());
}

#[test]
fn rebuild_runs_dependencies_first() {
  let env = TestEnv::from_fixture("app.projsys.json");
  env.node.build(&release(), Some("Rebuild")).unwrap();

  let lines = env.output.lines();
  let clean = lines.iter().position(|l| l == "cleaning Release").unwrap();
  let build = lines.iter().position(|l| l == "building Release").unwrap();
  assert!(clean < build);
  assert_eq!(env.node.active_configuration(), release());
}

#[test]
fn overlapping_builds_are_mutually_exclusive() {
  let env = TestEnv::from_fixture("app.projsys.json");
  let coordinator = env.node.coordinator();

  assert!(coordinator.try_begin_build(false, false));
  assert!(!coordinator.try_begin_build(false, false));
  assert!(matches!(
    env.node.build(&debug(), None),
    Err(ProjectError::Build(BuildError::BuildInProgress))
  ));

  coordinator.end_build(None, false, false);
  assert!(coordinator.try_begin_build(false, false));
  coordinator.end_build(None, false, false);
}

#[test]
fn nested_suspend_replays_last_target_once() {
  let env = TestEnv::from_fixture("app.projsys.json");
  let node = &env.node;

  node.suspend_msbuild();
  let first = node.call_msbuild(&debug(), "T1").unwrap();
  assert_eq!(first.outcome(), BuildOutcome::Suspended);
  node.suspend_msbuild();
  node.call_msbuild(&debug(), "T2").unwrap();

  assert!(node.resume_msbuild(&debug(), "T1").unwrap().is_none());
  assert_eq!(env.count_lines("ran T1") + env.count_lines("ran T2"), 0);

  let replayed = node.resume_msbuild(&debug(), "T2").unwrap().unwrap();
  assert!(replayed.is_successful());
  assert_eq!(env.count_lines("ran T2"), 1);
  assert_eq!(env.count_lines("ran T1"), 0);
  assert!(!node.coordinator().is_suspended());
}

#[test]
fn replay_uses_the_remembered_request_not_the_resume_arguments() {
  let env = TestEnv::from_fixture("app.projsys.json");
  let node = &env.node;

  node.suspend_msbuild();
  node.call_msbuild(&debug(), "T2").unwrap();
  let replayed = node.resume_msbuild(&release(), "T1").unwrap().unwrap();

  assert!(replayed.is_successful());
  assert_eq!(env.count_lines("ran T2"), 1);
  assert_eq!(env.count_lines("ran T1"), 0);
}

#[test]
fn resume_without_deferred_build_does_nothing() {
  let env = TestEnv::from_fixture("app.projsys.json");
  env.node.suspend_msbuild();
  assert!(env.node.resume_msbuild(&debug(), "T1").unwrap().is_none());
  assert_eq!(env.count_lines("ran T1"), 0);
}

#[test]
fn async_completion_sees_build_released() {
  let env = TestEnv::from_fixture("app.projsys.json");
  let observed: Rc<Cell<Option<bool>>> = Rc::new(Cell::new(None));
  let outcome: Rc<RefCell<Option<BuildOutcome>>> = Rc::new(RefCell::new(None));

  let node = env.node.clone();
  let seen = observed.clone();
  let recorded = outcome.clone();
  env
    .node
    .build_async(&debug(), Some("T1"), move |result| {
      seen.set(Some(node.build_in_progress()));
      recorded.replace(Some(result.outcome()));
    })
    .unwrap();

  assert!(env.node.build_in_progress());
  assert!(env.ui.pump_until(|| observed.get().is_some(), WAIT));
  assert_eq!(observed.get(), Some(false));
  assert_eq!(*outcome.borrow(), Some(BuildOutcome::Successful));
  assert_eq!(env.count_lines("ran T1"), 1);
}

#[test]
fn rejected_async_build_still_completes() {
  let env = TestEnv::from_fixture("app.projsys.json");
  assert!(env.node.coordinator().try_begin_build(false, false));

  let outcome: Rc<RefCell<Option<BuildOutcome>>> = Rc::new(RefCell::new(None));
  let recorded = outcome.clone();
  let result = env
    .node
    .build_async(&debug(), None, move |result| {
      recorded.replace(Some(result.outcome()));
    });

  assert!(matches!(result, Err(ProjectError::Build(BuildError::BuildInProgress))));
  assert_eq!(*outcome.borrow(), Some(BuildOutcome::Failed));
  env.node.coordinator().end_build(None, false, false);
}

#[test]
fn active_configuration_is_pinned_while_building() {
  let env = TestEnv::from_fixture("app.projsys.json");
  let done = Rc::new(Cell::new(false));
  let flag = done.clone();
  env.node.build_async(&debug(), None, move |_| flag.set(true)).unwrap();

  assert!(matches!(
    env.node.set_active_configuration(&release()),
    Err(ProjectError::Build(BuildError::ConfigurationMismatch { .. }))
  ));
  env.node.set_active_configuration(&debug()).unwrap();

  assert!(env.ui.pump_until(|| done.get(), WAIT));
  env.node.set_active_configuration(&release()).unwrap();
  assert_eq!(env.node.active_configuration(), release());
}

#[test]
fn design_time_builds_wait_for_user_builds_in_host() {
  let host: Rc<RefCell<Option<Arc<SharedHostBuildManager>>>> = Rc::new(RefCell::new(None));
  let slot = host.clone();
  let env = TestEnv::from_fixture_with("app.projsys.json", move |services| {
    let manager = SharedHostBuildManager::new(services.engine.clone());
    let shared: Arc<dyn HostBuildManager> = manager.clone();
    services.host = Some(shared);
    slot.replace(Some(manager));
  });
  let host = host.borrow().clone().unwrap();
  let configuration = env.node.configuration(&debug());

  host.begin_user_build().unwrap();
  assert!(matches!(
    configuration.enumerate_outputs("Built"),
    Err(OutputError::Build(BuildError::BuildInProgress))
  ));
  assert!(!env.node.build_in_progress());

  host.end_user_build().unwrap();
  let outputs = configuration.enumerate_outputs("Built").unwrap();
  assert_eq!(outputs.len(), 2);
  assert_eq!(host.design_time_builds(), 0);
  assert!(!host.is_ui_thread_claimed());
}

#[test]
fn project_builds_are_user_builds_in_host() {
  let host: Rc<RefCell<Option<Arc<SharedHostBuildManager>>>> = Rc::new(RefCell::new(None));
  let slot = host.clone();
  let env = TestEnv::from_fixture_with("app.projsys.json", move |services| {
    let manager = SharedHostBuildManager::new(services.engine.clone());
    let shared: Arc<dyn HostBuildManager> = manager.clone();
    services.host = Some(shared);
    slot.replace(Some(manager));
  });
  let host = host.borrow().clone().unwrap();

  let during: Rc<Cell<Option<usize>>> = Rc::new(Cell::new(None));
  let done = Rc::new(Cell::new(false));
  env
    .node
    .build_async(&debug(), None, {
      let during = during.clone();
      let done = done.clone();
      let host = host.clone();
      move |_| {
        during.set(Some(host.user_builds()));
        done.set(true);
      }
    })
    .unwrap();
  assert_eq!(host.user_builds(), 1);
  assert!(env.ui.pump_until(|| done.get(), WAIT));

  assert_eq!(during.get(), Some(0));
  assert_eq!(host.user_builds(), 0);
  assert!(host.begin_design_time_build().is_ok());
  host.end_design_time_build().unwrap();
}
