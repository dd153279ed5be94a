//! Configurations, properties, output groups and launch settings.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use projsys_lib::config::{ConfigurationKey, parse_condition, to_condition};
use projsys_lib::project::{LaunchError, LaunchFlags};
use projsys_lib::property::{EditGate, PropertyError};

use super::common::{TestEnv, debug, release};

#[test]
fn keys_round_trip_through_conditions() {
  let keys = [
    ConfigurationKey::new("Release", "Any CPU"),
    ConfigurationKey::new("Debug", "AnyCPU"),
    ConfigurationKey::new("Debug", "x64"),
    ConfigurationKey::new("Profile Build", "Win32"),
    ConfigurationKey::config_only("Release"),
  ];
  for key in keys {
    assert_eq!(parse_condition(&to_condition(&key)), key, "{key}");
  }
  assert_eq!(
    to_condition(&ConfigurationKey::new("Release", "Any CPU")),
    " '$(Configuration)|$(Platform)' == 'Release|AnyCPU' "
  );
}

struct CountingGate {
  queries: Cell<usize>,
}

impl EditGate for CountingGate {
  fn query_edit_files(&self, _paths: &[PathBuf]) -> bool {
    self.queries.set(self.queries.get() + 1);
    true
  }
}

#[test]
fn setting_the_same_value_twice_is_a_no_op() {
  let gate = Rc::new(CountingGate { queries: Cell::new(0) });
  let shared = gate.clone();
  let env = TestEnv::from_fixture_with("app.projsys.json", move |services| services.gate = shared);
  let configuration = env.node.configuration(&debug());

  let outputs = configuration.enumerate_outputs("Built").unwrap();
  assert_eq!(outputs.len(), 2);
  let built = configuration
    .output_groups()
    .into_iter()
    .find(|g| g.name() == "Built")
    .unwrap();
  assert!(built.is_valid());

  configuration.set_configuration_property("WarningLevel", "4").unwrap();
  assert!(env.node.is_dirty());
  assert_eq!(gate.queries.get(), 1);
  assert!(!built.is_valid());

  env.node.save().unwrap();
  configuration.enumerate_outputs("Built").unwrap();
  assert!(built.is_valid());

  configuration.set_configuration_property("WarningLevel", "4").unwrap();
  assert!(!env.node.is_dirty());
  assert_eq!(gate.queries.get(), 1);
  assert!(built.is_valid());
}

#[test]
fn configuration_writes_only_invalidate_that_configuration() {
  let env = TestEnv::from_fixture("app.projsys.json");
  let debug_cfg = env.node.configuration(&debug());
  let release_cfg = env.node.configuration(&release());

  let debug_key = debug_cfg.key_output("Built").unwrap().unwrap();
  let release_key = release_cfg.key_output("Built").unwrap().unwrap();
  assert!(debug_key.canonical_name().ends_with("bin/Debug/App.exe"));
  assert!(release_key.canonical_name().ends_with("bin/Release/App.exe"));

  release_cfg.set_configuration_property("OutputPath", "out/").unwrap();
  let debug_group = debug_cfg.output_groups().into_iter().find(|g| g.name() == "Built").unwrap();
  assert!(debug_group.is_valid());

  let moved = release_cfg.key_output("Built").unwrap().unwrap();
  assert!(moved.canonical_name().ends_with("out/App.exe"));
  assert_eq!(
    debug_cfg.get_configuration_property("OutputPath", false).as_deref(),
    Some("bin/Debug/")
  );
}

#[test]
fn denied_edits_leave_the_project_clean() {
  struct DenyAll;
  impl EditGate for DenyAll {
    fn query_edit_files(&self, _paths: &[PathBuf]) -> bool {
      false
    }
  }

  let env = TestEnv::from_fixture_with("app.projsys.json", |services| services.gate = Rc::new(DenyAll));
  let configuration = env.node.configuration(&debug());
  assert!(matches!(
    configuration.set_configuration_property("OutputPath", "elsewhere/"),
    Err(PropertyError::EditDenied { .. })
  ));
  assert!(!env.node.is_dirty());
  assert_eq!(
    configuration.get_configuration_property("OutputPath", true).as_deref(),
    Some("bin/Debug/")
  );
}

#[test]
fn registry_edits_round_trip_through_save() {
  let env = TestEnv::from_fixture("app.projsys.json");
  let registry = env.node.registry();

  registry.add_configuration("Staging", Some("Release")).unwrap();
  registry.rename_configuration("Staging", "Preview").unwrap();
  registry.delete_configuration("Debug").unwrap();
  env.node.save().unwrap();
  env.node.reload().unwrap();

  assert_eq!(env.node.registry().configuration_names(), vec!["Release", "Preview"]);
  let preview = env.node.configuration(&ConfigurationKey::new("Preview", "Any CPU"));
  assert_eq!(
    preview.get_configuration_property("OutputPath", false).as_deref(),
    Some("bin/Release/")
  );
}

#[test]
fn libraries_cannot_be_launched() {
  let env = TestEnv::from_fixture("library.projsys.json");
  let configuration = env.node.configuration(&debug());
  assert_eq!(
    configuration.derive_launch_info(LaunchFlags::default()).unwrap_err(),
    LaunchError::ClassLibraryCannotBeStartedDirectly
  );
}

#[test]
fn console_launch_without_debugging_keeps_the_window_open() {
  let env = TestEnv::from_fixture_with("app.projsys.json", |services| services.shell = "cmd.exe".into());
  let configuration = env.node.configuration(&debug());
  configuration.set_configuration_property("StartArguments", "a&b").unwrap();

  let debugged = configuration.derive_launch_info(LaunchFlags::default()).unwrap();
  assert!(debugged.executable.ends_with("bin/Debug/App.exe"));
  assert_eq!(debugged.arguments, "a&b");

  let info = configuration.derive_launch_info(LaunchFlags { no_debug: true }).unwrap();
  assert_eq!(info.executable, PathBuf::from("cmd.exe"));
  assert_eq!(
    info.arguments,
    format!("/c \"\"{}\" a^&b & pause\"", debugged.executable.display())
  );
}
