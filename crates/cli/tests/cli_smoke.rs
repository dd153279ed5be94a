//! CLI smoke tests for projsys.
//!
//! Each test runs the binary against a project file in its own temp directory.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

const APP_PROJECT: &str = include_str!("../../lib/tests/fixtures/app.projsys.json");
const LIBRARY_PROJECT: &str = include_str!("../../lib/tests/fixtures/library.projsys.json");

/// A temp directory holding one project file.
fn temp_project(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("app.projsys.json"), content).unwrap();
  temp
}

/// A `projsys` command rooted in `dir`, isolated from the user's settings.
fn projsys(dir: &TempDir) -> Command {
  let mut cmd = cargo_bin_cmd!("projsys");
  cmd
    .current_dir(dir.path())
    .env("XDG_CONFIG_HOME", dir.path().join(".config"))
    .env_remove("PROJSYS_WORKER_THREADS")
    .env_remove("PROJSYS_VERBOSITY")
    .env_remove("PROJSYS_HOST_BUILD_MANAGER")
    .env_remove("RUST_LOG");
  cmd
}

fn project_json(dir: &TempDir) -> serde_json::Value {
  let raw = std::fs::read_to_string(dir.path().join("app.projsys.json")).unwrap();
  serde_json::from_str(&raw).unwrap()
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  cargo_bin_cmd!("projsys")
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  cargo_bin_cmd!("projsys")
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("projsys"));
}

#[test]
fn missing_project_fails() {
  let temp = TempDir::new().unwrap();
  projsys(&temp)
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("projsys.json"));
}

// =============================================================================
// Build
// =============================================================================

#[test]
fn build_streams_task_output() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("building Debug"))
    .stdout(predicate::str::contains("Build succeeded."));
}

#[test]
fn build_for_named_configuration() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["build", "-c", "Release|AnyCPU"])
    .assert()
    .success()
    .stdout(predicate::str::contains("building Release"));
}

#[test]
fn build_unknown_configuration_fails() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["build", "-c", "Nightly"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unknown configuration"))
    .stderr(predicate::str::contains("Debug|Any CPU"));
}

#[test]
fn build_async_waits_for_completion() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["build", "--async", "--timeout", "30s"])
    .assert()
    .success()
    .stdout(predicate::str::contains("building Debug"));
}

#[test]
fn rebuild_cleans_before_building() {
  let temp = temp_project(APP_PROJECT);
  let assert = projsys(&temp).arg("rebuild").assert().success();
  let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
  let clean = stdout.find("cleaning Debug").expect("clean ran");
  let build = stdout.find("building Debug").expect("build ran");
  assert!(clean < build);
}

#[test]
fn clean_runs_once() {
  let temp = temp_project(APP_PROJECT);
  let assert = projsys(&temp).arg("clean").assert().success();
  let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
  assert_eq!(stdout.matches("cleaning Debug").count(), 1);
}

// =============================================================================
// Configurations
// =============================================================================

#[test]
fn configs_list_marks_active() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["configs", "list"])
    .assert()
    .success()
    .stdout(predicate::str::contains("* Debug|Any CPU"))
    .stdout(predicate::str::contains("  Release|Any CPU"));
}

#[test]
fn configs_list_json() {
  let temp = temp_project(APP_PROJECT);
  let assert = projsys(&temp).args(["configs", "list", "-o", "json"]).assert().success();
  let listing: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
  assert_eq!(listing["active"], "Debug|Any CPU");
  assert_eq!(listing["platforms"], serde_json::json!(["Any CPU"]));
}

#[test]
fn configs_add_is_saved() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["configs", "add", "Preview", "--clone-from", "Release"])
    .assert()
    .success();

  projsys(&temp)
    .args(["prop", "get", "OutputPath", "-c", "Preview|AnyCPU"])
    .assert()
    .success()
    .stdout(predicate::str::contains("bin/Release/"));
}

#[test]
fn configs_delete_requires_force_when_not_interactive() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["configs", "delete", "Release"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--force"));

  projsys(&temp)
    .args(["configs", "delete", "Release", "--force"])
    .assert()
    .success();
  projsys(&temp)
    .args(["configs", "list"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Release").not());
}

#[test]
fn configs_add_duplicate_fails() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["configs", "add", "Debug"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("already exists"));
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn prop_get_project_property() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["prop", "get", "AssemblyName"])
    .assert()
    .success()
    .stdout(predicate::str::diff("App\n"));
}

#[test]
fn prop_get_undefined_fails() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["prop", "get", "NoSuchProperty"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not defined"));
}

#[test]
fn prop_set_configuration_property_is_scoped() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["prop", "set", "OutputPath", "out/dbg/", "-c", "Debug|AnyCPU"])
    .assert()
    .success();

  projsys(&temp)
    .args(["prop", "get", "OutputPath", "-c", "Debug|AnyCPU"])
    .assert()
    .success()
    .stdout(predicate::str::contains("out/dbg/"));
  projsys(&temp)
    .args(["prop", "get", "OutputPath", "-c", "Release|AnyCPU"])
    .assert()
    .success()
    .stdout(predicate::str::contains("bin/Release/"));
}

// =============================================================================
// Outputs & Launch
// =============================================================================

#[test]
fn outputs_lists_groups() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .arg("outputs")
    .assert()
    .success()
    .stdout(predicate::str::contains("Built"))
    .stdout(predicate::str::contains("BuiltProjectOutputGroup"));
}

#[test]
fn outputs_marks_key_output() {
  let temp = temp_project(APP_PROJECT);
  let assert = projsys(&temp).args(["outputs", "-g", "Built", "-o", "json"]).assert().success();
  let entries: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
  let entries = entries.as_array().unwrap();
  assert_eq!(entries.len(), 2);
  let keys: Vec<_> = entries.iter().filter(|e| e["is_key_output"] == true).collect();
  assert_eq!(keys.len(), 1);
  assert!(keys[0]["path"].as_str().unwrap().ends_with("App.exe"));
}

#[test]
fn outputs_unknown_group_fails() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["outputs", "-g", "Missing"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown output group"));
}

#[test]
fn launch_shows_executable() {
  let temp = temp_project(APP_PROJECT);
  let assert = projsys(&temp).args(["launch", "-o", "json"]).assert().success();
  let info: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
  assert!(info["executable"].as_str().unwrap().ends_with("App.exe"));
  assert_eq!(info["debug_engine"], "managed");
  assert_eq!(info["no_debug"], false);
}

#[test]
fn launch_library_is_refused() {
  let temp = temp_project(LIBRARY_PROJECT);
  projsys(&temp)
    .arg("launch")
    .assert()
    .failure()
    .stderr(predicate::str::contains("class library"));
}

// =============================================================================
// Rename
// =============================================================================

#[test]
fn rename_moves_file_and_item() {
  let temp = temp_project(APP_PROJECT);
  std::fs::write(temp.path().join("Program.cs"), "class Program {}").unwrap();

  projsys(&temp)
    .args(["rename", "Program.cs", "Main.cs"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Renamed"));

  assert!(temp.path().join("Main.cs").exists());
  assert!(!temp.path().join("Program.cs").exists());
  let items = project_json(&temp)["items"].clone();
  assert!(items.as_array().unwrap().iter().any(|i| i["include"] == "Main.cs"));
}

#[test]
fn rename_unknown_item_fails() {
  let temp = temp_project(APP_PROJECT);
  projsys(&temp)
    .args(["rename", "Nope.cs", "Other.cs"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not part of the project"));
}
