//! `projsys build`, `rebuild` and `clean`.
//!
//! Synchronous builds go straight to the project node. `--async` goes through
//! the buildable adapter and pumps the UI context until the build ends.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::info;

use projsys_lib::build::BuildOutcome;
use projsys_lib::config::ConfigurationKey;
use projsys_lib::consts::{CLEAN_TARGET, REBUILD_TARGET};
use projsys_lib::project::{BuildOptions, BuildStatusCallback, CallbackResult};

use super::Session;
use crate::output::{print_build_summary, print_info};

pub fn cmd_build(
  project: Option<&Path>,
  config: Option<&str>,
  target: Option<&str>,
  run_async: bool,
  timeout: Duration,
) -> Result<()> {
  let session = Session::open(project)?;
  let key = session.configuration_key(config)?;
  if run_async {
    if target.is_some_and(|t| t != REBUILD_TARGET) {
      bail!("--async builds the default targets or Rebuild only");
    }
    return build_async(&session, &key, target.is_some(), timeout);
  }
  run_sync(&session, &key, target)
}

pub fn cmd_rebuild(project: Option<&Path>, config: Option<&str>) -> Result<()> {
  let session = Session::open(project)?;
  let key = session.configuration_key(config)?;
  run_sync(&session, &key, Some(REBUILD_TARGET))
}

pub fn cmd_clean(project: Option<&Path>, config: Option<&str>) -> Result<()> {
  let session = Session::open(project)?;
  let key = session.configuration_key(config)?;
  run_sync(&session, &key, Some(CLEAN_TARGET))
}

fn run_sync(session: &Session, key: &ConfigurationKey, target: Option<&str>) -> Result<()> {
  let what = format!("{} ({key})", target.unwrap_or("Build"));
  print_info(&format!("Building {what}"));
  let started = Instant::now();

  session.node.prepare_build(key, false).context("Failed to prepare build")?;
  let result = session.node.build(key, target).context("Build failed to start")?;
  print_build_summary(&what, result.outcome(), started.elapsed());
  if !result.is_successful() {
    bail!("{what} failed");
  }
  Ok(())
}

/// Records how the build ended.
struct Completion {
  ended: Cell<Option<bool>>,
}

impl BuildStatusCallback for Completion {
  fn build_begin(&self) -> CallbackResult<bool> {
    Ok(true)
  }

  fn build_end(&self, success: bool) -> CallbackResult<()> {
    self.ended.set(Some(success));
    Ok(())
  }
}

fn build_async(session: &Session, key: &ConfigurationKey, rebuild: bool, timeout: Duration) -> Result<()> {
  let what = format!("{} ({key})", if rebuild { REBUILD_TARGET } else { "Build" });
  let buildable = session.node.buildable(key)?;
  let completion = Rc::new(Completion { ended: Cell::new(None) });
  let cookie = buildable.advise_build_status_callback(completion.clone());

  if !buildable.query_start_build(BuildOptions { rebuild }) {
    bail!("A build is already in progress");
  }
  print_info(&format!("Building {what} on the build engine"));
  let started = Instant::now();
  buildable
    .start_build(BuildOptions { rebuild })
    .context("Build failed to start")?;

  let finished = session.ui.pump_until(|| completion.ended.get().is_some(), timeout);
  buildable.unadvise_build_status_callback(cookie);
  if !finished {
    bail!("{what} did not finish within {}", humantime::format_duration(timeout));
  }
  let outcome = match completion.ended.get() {
    Some(true) => BuildOutcome::Successful,
    _ => BuildOutcome::Failed,
  };
  info!(configuration = %key, ?outcome, "async build finished");
  print_build_summary(&what, outcome, started.elapsed());
  if outcome != BuildOutcome::Successful {
    bail!("{what} failed");
  }
  Ok(())
}
