//! Command routing.
//!
//! A [`Command`] is routed to the first handler in the chain whose predicate
//! claims it. Nothing claiming it means [`CommandResult::NotSupported`].

use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::consts::{CLEAN_TARGET, REBUILD_TARGET};

use super::node::ProjectNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandGroup {
  /// Commands every node understands: save, reload.
  Standard,
  /// Build commands.
  Build,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
  pub group: CommandGroup,
  pub id: u32,
}

impl Command {
  pub const SAVE: Command = Command::new(CommandGroup::Standard, 1);
  pub const RELOAD: Command = Command::new(CommandGroup::Standard, 2);
  pub const BUILD: Command = Command::new(CommandGroup::Build, 1);
  pub const REBUILD: Command = Command::new(CommandGroup::Build, 2);
  pub const CLEAN: Command = Command::new(CommandGroup::Build, 3);

  pub const fn new(group: CommandGroup, id: u32) -> Self {
    Self { group, id }
  }
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}:{}", self.group, self.id)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
  Enabled,
  Disabled,
  NotSupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
  Handled,
  NotSupported,
  Failed(String),
}

type Predicate = Box<dyn Fn(&Command) -> bool>;
type StatusFn = Box<dyn Fn(&Command) -> CommandStatus>;
type ExecFn = Box<dyn Fn(&Command) -> CommandResult>;

struct Handler {
  name: &'static str,
  claims: Predicate,
  status: StatusFn,
  exec: ExecFn,
}

#[derive(Default)]
pub struct CommandDispatcher {
  handlers: Vec<Handler>,
}

impl fmt::Debug for CommandDispatcher {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.handlers.iter().map(|h| h.name)).finish()
  }
}

impl CommandDispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a handler. Handlers are consulted in the order they were added.
  pub fn handle(
    mut self,
    name: &'static str,
    claims: impl Fn(&Command) -> bool + 'static,
    status: impl Fn(&Command) -> CommandStatus + 'static,
    exec: impl Fn(&Command) -> CommandResult + 'static,
  ) -> Self {
    self.handlers.push(Handler {
      name,
      claims: Box::new(claims),
      status: Box::new(status),
      exec: Box::new(exec),
    });
    self
  }

  fn route(&self, command: &Command) -> Option<&Handler> {
    self.handlers.iter().find(|h| (h.claims)(command))
  }

  pub fn query_status(&self, command: &Command) -> CommandStatus {
    self
      .route(command)
      .map_or(CommandStatus::NotSupported, |h| (h.status)(command))
  }

  pub fn exec(&self, command: &Command) -> CommandResult {
    let Some(handler) = self.route(command) else {
      debug!(%command, "no handler claims command");
      return CommandResult::NotSupported;
    };
    if (handler.status)(command) == CommandStatus::Disabled {
      return CommandResult::Failed(format!("{command} is disabled"));
    }
    debug!(%command, handler = handler.name, "dispatching command");
    let result = (handler.exec)(command);
    if let CommandResult::Failed(message) = &result {
      warn!(%command, handler = handler.name, error = %message, "command failed");
    }
    result
  }
}

/// Build, rebuild, clean, save and reload for the node behind `node`.
pub fn project_commands(node: Weak<ProjectNode>) -> CommandDispatcher {
  let build_node = node.clone();
  let build_status = node.clone();
  let save_node = node.clone();
  let save_status = node;

  CommandDispatcher::new()
    .handle(
      "build",
      |c| c.group == CommandGroup::Build,
      move |_| match build_status.upgrade() {
        Some(node) if !node.build_in_progress() => CommandStatus::Enabled,
        _ => CommandStatus::Disabled,
      },
      move |c| with_node(&build_node, |node| run_build(&node, c)),
    )
    .handle(
      "document",
      |c| *c == Command::SAVE || *c == Command::RELOAD,
      move |c| match save_status.upgrade() {
        Some(node) if *c == Command::RELOAD || node.is_dirty() => CommandStatus::Enabled,
        _ => CommandStatus::Disabled,
      },
      move |c| {
        with_node(&save_node, |node| {
          let result = if *c == Command::SAVE { node.save() } else { node.reload() };
          result.map_err(|e| e.to_string())
        })
      },
    )
}

fn run_build(node: &ProjectNode, command: &Command) -> Result<(), String> {
  let target = match *command {
    Command::BUILD => None,
    Command::REBUILD => Some(REBUILD_TARGET),
    Command::CLEAN => Some(CLEAN_TARGET),
    _ => return Err(format!("unknown build command {command}")),
  };
  let active = node.active_configuration();
  node.prepare_build(&active, target == Some(CLEAN_TARGET)).map_err(|e| e.to_string())?;
  let result = node.build(&active, target).map_err(|e| e.to_string())?;
  if result.is_successful() {
    Ok(())
  } else {
    Err(format!("build {}", result.outcome()))
  }
}

fn with_node(node: &Weak<ProjectNode>, f: impl FnOnce(Rc<ProjectNode>) -> Result<(), String>) -> CommandResult {
  match node.upgrade() {
    Some(node) => match f(node) {
      Ok(()) => CommandResult::Handled,
      Err(message) => CommandResult::Failed(message),
    },
    None => CommandResult::Failed("project is closed".to_string()),
  }
}
