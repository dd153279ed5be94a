//! Build output formatting for the IDE output pane.

use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::{BuildEvent, Diagnostic, EngineLogger, Importance};

/// How much build output reaches the output pane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
  Quiet,
  Minimal,
  #[default]
  Normal,
  Detailed,
  Diagnostic,
}

impl FromStr for Verbosity {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "q" | "quiet" => Ok(Verbosity::Quiet),
      "m" | "minimal" => Ok(Verbosity::Minimal),
      "n" | "normal" => Ok(Verbosity::Normal),
      "d" | "detailed" => Ok(Verbosity::Detailed),
      "diag" | "diagnostic" => Ok(Verbosity::Diagnostic),
      other => Err(format!("unknown verbosity '{other}'")),
    }
  }
}

/// Destination for formatted build output.
pub trait OutputSink: Send + Sync {
  fn write_line(&self, line: &str) -> io::Result<()>;
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
  lines: Mutex<Vec<String>>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn lines(&self) -> Vec<String> {
    self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  pub fn contains(&self, needle: &str) -> bool {
    self.lines().iter().any(|line| line.contains(needle))
  }
}

impl OutputSink for MemorySink {
  fn write_line(&self, line: &str) -> io::Result<()> {
    self.lines.lock().unwrap_or_else(|e| e.into_inner()).push(line.to_string());
    Ok(())
  }
}

/// Writes lines to any writer, such as stdout.
pub struct WriterSink<W: Write + Send> {
  writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
  pub fn new(writer: W) -> Self {
    Self {
      writer: Mutex::new(writer),
    }
  }
}

impl<W: Write + Send> OutputSink for WriterSink<W> {
  fn write_line(&self, line: &str) -> io::Result<()> {
    let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
    writeln!(writer, "{line}")?;
    writer.flush()
  }
}

/// Formats engine events in Visual Studio error format and counts diagnostics.
///
/// Sink failures are logged and dropped; they never fail a build.
pub struct IdeBuildLogger {
  sink: std::sync::Arc<dyn OutputSink>,
  verbosity: Verbosity,
  errors: AtomicUsize,
  warnings: AtomicUsize,
}

impl IdeBuildLogger {
  pub fn new(sink: std::sync::Arc<dyn OutputSink>, verbosity: Verbosity) -> Self {
    Self {
      sink,
      verbosity,
      errors: AtomicUsize::new(0),
      warnings: AtomicUsize::new(0),
    }
  }

  pub fn errors(&self) -> usize {
    self.errors.load(Ordering::SeqCst)
  }

  pub fn warnings(&self) -> usize {
    self.warnings.load(Ordering::SeqCst)
  }

  fn write(&self, line: &str) {
    if let Err(e) = self.sink.write_line(line) {
      warn!(error = %e, "failed to write build output");
    }
  }

  fn shows(&self, at_least: Verbosity) -> bool {
    self.verbosity >= at_least
  }
}

impl EngineLogger for IdeBuildLogger {
  fn on_event(&self, event: &BuildEvent) {
    match event {
      BuildEvent::BuildStarted { project, .. } => {
        if self.shows(Verbosity::Normal) {
          self.write(&format!("------ Build started: Project: {} ------", project.display()));
        }
      }
      BuildEvent::TargetStarted { name } => {
        if self.shows(Verbosity::Detailed) {
          self.write(&format!("Target \"{name}\":"));
        }
      }
      BuildEvent::TargetSkipped { name } => {
        if self.shows(Verbosity::Diagnostic) {
          self.write(&format!("Target \"{name}\" skipped: condition was false."));
        }
      }
      BuildEvent::TargetFinished { name, success } => {
        if self.shows(Verbosity::Diagnostic) {
          let state = if *success { "succeeded" } else { "failed" };
          self.write(&format!("Done building target \"{name}\" ({state})."));
        }
      }
      BuildEvent::Message { importance, text } => {
        let needed = match importance {
          Importance::High => Verbosity::Minimal,
          Importance::Normal => Verbosity::Normal,
          Importance::Low => Verbosity::Detailed,
        };
        if self.shows(needed) {
          self.write(text);
        }
      }
      BuildEvent::Warning(diagnostic) => {
        self.warnings.fetch_add(1, Ordering::SeqCst);
        self.write(&format_diagnostic("warning", diagnostic));
      }
      BuildEvent::Error(diagnostic) => {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.write(&format_diagnostic("error", diagnostic));
      }
      BuildEvent::BuildFinished { success, .. } => {
        if self.shows(Verbosity::Minimal) {
          let summary = if *success { "Build succeeded." } else { "Build FAILED." };
          self.write(summary);
          self.write(&format!("    {} Warning(s)", self.warnings()));
          self.write(&format!("    {} Error(s)", self.errors()));
        }
      }
    }
  }
}

/// `file(line,col): kind CODE: text`, dropping whatever parts are missing.
pub fn format_diagnostic(kind: &str, diagnostic: &Diagnostic) -> String {
  let mut out = String::new();
  if let Some(file) = &diagnostic.file {
    out.push_str(file);
    match (diagnostic.line, diagnostic.column) {
      (Some(line), Some(column)) => out.push_str(&format!("({line},{column})")),
      (Some(line), None) => out.push_str(&format!("({line})")),
      _ => {}
    }
    out.push_str(": ");
  }
  out.push_str(kind);
  if let Some(code) = &diagnostic.code {
    out.push(' ');
    out.push_str(code);
  }
  out.push_str(": ");
  out.push_str(&diagnostic.text);
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use tracing_test::traced_test;

  struct BrokenSink;

  impl OutputSink for BrokenSink {
    fn write_line(&self, _: &str) -> io::Result<()> {
      Err(io::Error::other("pane closed"))
    }
  }

  #[test]
  fn formats_visual_studio_style() {
    let mut diagnostic = Diagnostic::new("missing ;").with_code(Some("CS1002".into()));
    diagnostic.file = Some("src/Main.cs".into());
    diagnostic.line = Some(3);
    diagnostic.column = Some(14);
    assert_eq!(
      format_diagnostic("error", &diagnostic),
      "src/Main.cs(3,14): error CS1002: missing ;"
    );
    assert_eq!(format_diagnostic("warning", &Diagnostic::new("odd")), "warning: odd");
  }

  #[test]
  fn verbosity_filters_messages_but_not_errors() {
    let sink = Arc::new(MemorySink::new());
    let logger = IdeBuildLogger::new(sink.clone(), Verbosity::Minimal);
    logger.on_event(&BuildEvent::Message {
      importance: Importance::Normal,
      text: "chatter".into(),
    });
    logger.on_event(&BuildEvent::Message {
      importance: Importance::High,
      text: "important".into(),
    });
    logger.on_event(&BuildEvent::Error(Diagnostic::new("bad")));

    assert!(!sink.contains("chatter"));
    assert!(sink.contains("important"));
    assert!(sink.contains("error: bad"));
    assert_eq!(logger.errors(), 1);
  }

  #[test]
  #[traced_test]
  fn sink_failures_are_logged_not_raised() {
    let logger = IdeBuildLogger::new(Arc::new(BrokenSink), Verbosity::Normal);
    logger.on_event(&BuildEvent::Warning(Diagnostic::new("w")));
    assert_eq!(logger.warnings(), 1);
    assert!(logs_contain("failed to write build output"));
  }

  #[test]
  fn parses_verbosity_names() {
    assert_eq!("diag".parse::<Verbosity>(), Ok(Verbosity::Diagnostic));
    assert_eq!("Quiet".parse::<Verbosity>(), Ok(Verbosity::Quiet));
    assert!("loud".parse::<Verbosity>().is_err());
  }
}
