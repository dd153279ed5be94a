//! Task execution.
//!
//! Tasks run inside a target against the instance being built. Failures are
//! reported as error events; the return value only says whether the target
//! may continue.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use super::eval::expand;
use super::instance::{ItemInstance, ProjectInstance};
use super::project::{Importance, Task};
use super::submission::Reporter;
use super::types::{BuildEvent, Diagnostic};
use crate::util::hash::hash_file;

/// Run one task. Returns false when the task failed and the target must stop.
pub(super) async fn execute_task(
  task: &Task,
  instance: &mut ProjectInstance,
  reporter: &Reporter,
  shell: Option<&str>,
) -> bool {
  let dir = instance.project_dir().to_path_buf();
  let x = |raw: &str| expand(raw, instance.properties(), instance.all_items());

  match task {
    Task::Exec {
      command,
      working_dir,
      env,
      continue_on_error,
    } => {
      let command = x(command);
      let cwd = working_dir.as_deref().map(|d| dir.join(x(d))).unwrap_or_else(|| dir.clone());
      let env: BTreeMap<String, String> = env.iter().map(|(k, v)| (k.clone(), x(v))).collect();
      execute_exec(&command, &cwd, &env, *continue_on_error, shell, reporter).await
    }

    Task::MakeDir { path } => {
      let path = dir.join(x(path));
      match tokio::fs::create_dir_all(&path).await {
        Ok(()) => true,
        Err(e) => report_io(reporter, "MakeDir", &path, &e),
      }
    }

    Task::Copy {
      from,
      to,
      skip_unchanged,
    } => {
      let from = dir.join(x(from));
      let to = x(to);
      let mut dest = dir.join(&to);
      if (to.ends_with('/') || to.ends_with('\\') || dest.is_dir())
        && let Some(name) = from.file_name()
      {
        dest = dest.join(name);
      }
      copy_file(&from, &dest, *skip_unchanged, reporter).await
    }

    Task::Delete { path } => {
      let path = dir.join(x(path));
      match tokio::fs::remove_file(&path).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => report_io(reporter, "Delete", &path, &e),
      }
    }

    Task::Message { text, importance } => {
      reporter.emit(BuildEvent::Message {
        importance: *importance,
        text: x(text),
      });
      true
    }

    Task::Warning { text, code, file } => {
      reporter.emit(BuildEvent::Warning(
        Diagnostic::new(x(text))
          .with_code(code.clone())
          .with_file(file.as_deref().map(|f| x(f))),
      ));
      true
    }

    Task::Error { text, code, file } => {
      reporter.emit(BuildEvent::Error(
        Diagnostic::new(x(text))
          .with_code(code.clone())
          .with_file(file.as_deref().map(|f| x(f))),
      ));
      false
    }

    Task::AddItem {
      item_type,
      include,
      metadata,
    } => {
      let include = x(include);
      let metadata: BTreeMap<String, String> = metadata.iter().map(|(k, v)| (k.clone(), x(v))).collect();
      for entry in include.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        instance.add_item(ItemInstance::new(item_type, entry.to_string(), metadata.clone(), &dir));
      }
      true
    }

    Task::SetProperty { name, value } => {
      let value = x(value);
      instance.set_property(name, &value);
      true
    }
  }
}

async fn execute_exec(
  command: &str,
  cwd: &Path,
  env: &BTreeMap<String, String>,
  continue_on_error: bool,
  shell: Option<&str>,
  reporter: &Reporter,
) -> bool {
  let (shell_cmd, shell_args) = get_shell(shell);
  debug!(cmd = %command, shell = %shell_cmd, cwd = ?cwd, "executing command");

  reporter.emit(BuildEvent::Message {
    importance: Importance::Normal,
    text: command.to_string(),
  });

  let mut process = Command::new(&shell_cmd);
  process.args(&shell_args).arg(command).current_dir(cwd).envs(env);

  let output = match process.output().await {
    Ok(output) => output,
    Err(e) => {
      reporter.emit(BuildEvent::Error(
        Diagnostic::new(format!("failed to start \"{command}\": {e}")).with_code(Some("MSB6003".into())),
      ));
      return false;
    }
  };

  for line in String::from_utf8_lossy(&output.stdout).lines() {
    reporter.emit(BuildEvent::Message {
      importance: Importance::Normal,
      text: line.to_string(),
    });
  }
  for line in String::from_utf8_lossy(&output.stderr).lines() {
    reporter.emit(BuildEvent::Message {
      importance: Importance::High,
      text: line.to_string(),
    });
  }

  if output.status.success() {
    return true;
  }

  let code = output
    .status
    .code()
    .map(|c| c.to_string())
    .unwrap_or_else(|| "unknown".to_string());
  let diagnostic = Diagnostic::new(format!("The command \"{command}\" exited with code {code}."))
    .with_code(Some("MSB3073".into()));

  if continue_on_error {
    reporter.emit(BuildEvent::Warning(diagnostic));
    true
  } else {
    reporter.emit(BuildEvent::Error(diagnostic));
    false
  }
}

async fn copy_file(from: &Path, dest: &Path, skip_unchanged: bool, reporter: &Reporter) -> bool {
  if skip_unchanged && dest.exists() {
    if let (Ok(a), Ok(b)) = (hash_file(from), hash_file(dest))
      && a == b
    {
      debug!(from = ?from, to = ?dest, "skipping unchanged copy");
      return true;
    }
  }

  if let Some(parent) = dest.parent()
    && let Err(e) = tokio::fs::create_dir_all(parent).await
  {
    return report_io(reporter, "Copy", parent, &e);
  }

  match tokio::fs::copy(from, dest).await {
    Ok(_) => true,
    Err(e) => report_io(reporter, "Copy", from, &e),
  }
}

fn report_io(reporter: &Reporter, task: &str, path: &Path, error: &io::Error) -> bool {
  let diagnostic = Diagnostic::new(format!("{task} failed for {}: {error}", path.display()))
    .with_file(Some(PathBuf::from(path).to_string_lossy().to_string()));
  reporter.emit(BuildEvent::Error(diagnostic));
  false
}

/// Get the shell command and argument for the current platform.
///
/// An explicit shell picks its argument style from its name; otherwise
/// `/bin/sh -c` on Unix and `cmd.exe /C` on Windows.
pub fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    ("cmd.exe".to_string(), vec!["/C".to_string()])
  }
}
