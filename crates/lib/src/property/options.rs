//! Typed view of the compiler-facing project properties.
//!
//! Project files are edited by hand and often carry stale values. Every typed
//! property is parsed leniently: a value that does not parse is logged and the
//! default is kept.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::engine::ProjectInstance;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputType {
  #[default]
  Exe,
  WinExe,
  Library,
  Module,
}

impl OutputType {
  pub fn extension(self) -> &'static str {
    match self {
      OutputType::Exe | OutputType::WinExe => "exe",
      OutputType::Library => "dll",
      OutputType::Module => "netmodule",
    }
  }

  pub fn is_executable(self) -> bool {
    matches!(self, OutputType::Exe | OutputType::WinExe)
  }
}

impl FromStr for OutputType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "exe" => Ok(OutputType::Exe),
      "winexe" => Ok(OutputType::WinExe),
      "library" => Ok(OutputType::Library),
      "module" => Ok(OutputType::Module),
      other => Err(format!("unknown output type '{other}'")),
    }
  }
}

impl fmt::Display for OutputType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      OutputType::Exe => "Exe",
      OutputType::WinExe => "WinExe",
      OutputType::Library => "Library",
      OutputType::Module => "Module",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOptions {
  pub output_type: OutputType,
  pub assembly_name: String,
  pub output_path: PathBuf,
  pub output_assembly: PathBuf,
  pub documentation_file: Option<PathBuf>,
  pub define_constants: Vec<String>,
  pub debug_symbols: bool,
  pub optimize: bool,
  pub treat_warnings_as_errors: bool,
  pub allow_unsafe_blocks: bool,
  pub check_for_overflow: bool,
  pub warning_level: u32,
  pub base_address: u64,
  pub file_alignment: u32,
  pub platform_target: Option<String>,
}

impl Default for ProjectOptions {
  fn default() -> Self {
    Self {
      output_type: OutputType::default(),
      assembly_name: String::new(),
      output_path: PathBuf::new(),
      output_assembly: PathBuf::new(),
      documentation_file: None,
      define_constants: Vec::new(),
      debug_symbols: false,
      optimize: false,
      treat_warnings_as_errors: false,
      allow_unsafe_blocks: false,
      check_for_overflow: false,
      warning_level: 4,
      base_address: 0,
      file_alignment: 512,
      platform_target: None,
    }
  }
}

impl ProjectOptions {
  /// Read options from an evaluated instance.
  pub fn from_instance(instance: &ProjectInstance) -> Self {
    let mut options = Self::default();
    let dir = instance.project_dir();
    let get = |name: &str| instance.property(name).map(str::trim).filter(|v| !v.is_empty());

    if let Some(raw) = get("OutputType") {
      match raw.parse() {
        Ok(output_type) => options.output_type = output_type,
        Err(e) => warn!(property = "OutputType", value = raw, error = %e, "ignoring invalid property"),
      }
    }

    options.assembly_name = get("AssemblyName")
      .or_else(|| get("MSBuildProjectName"))
      .unwrap_or_default()
      .to_string();
    options.output_path = dir.join(get("OutputPath").unwrap_or_default());
    options.output_assembly = options
      .output_path
      .join(format!("{}.{}", options.assembly_name, options.output_type.extension()));
    options.documentation_file = get("DocumentationFile").map(|f| dir.join(f));
    options.define_constants = get("DefineConstants")
      .map(|d| {
        d.split([';', ','])
          .map(str::trim)
          .filter(|c| !c.is_empty())
          .map(str::to_string)
          .collect()
      })
      .unwrap_or_default();
    options.platform_target = get("PlatformTarget").map(str::to_string);

    lenient(&mut options.debug_symbols, "DebugSymbols", get("DebugSymbols"), parse_bool);
    lenient(&mut options.optimize, "Optimize", get("Optimize"), parse_bool);
    lenient(
      &mut options.treat_warnings_as_errors,
      "TreatWarningsAsErrors",
      get("TreatWarningsAsErrors"),
      parse_bool,
    );
    lenient(
      &mut options.allow_unsafe_blocks,
      "AllowUnsafeBlocks",
      get("AllowUnsafeBlocks"),
      parse_bool,
    );
    lenient(
      &mut options.check_for_overflow,
      "CheckForOverflowUnderflow",
      get("CheckForOverflowUnderflow"),
      parse_bool,
    );
    lenient(&mut options.warning_level, "WarningLevel", get("WarningLevel"), |v| {
      v.parse::<u32>().ok()
    });
    lenient(&mut options.base_address, "BaseAddress", get("BaseAddress"), parse_address);
    lenient(&mut options.file_alignment, "FileAlignment", get("FileAlignment"), |v| {
      v.parse::<u32>().ok()
    });

    options
  }
}

fn lenient<T>(slot: &mut T, name: &str, raw: Option<&str>, parse: impl Fn(&str) -> Option<T>) {
  let Some(raw) = raw else {
    return;
  };
  match parse(raw) {
    Some(value) => *slot = value,
    None => warn!(property = name, value = raw, "ignoring invalid property"),
  }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "true" | "on" | "yes" | "1" => Some(true),
    "false" | "off" | "no" | "0" => Some(false),
    _ => None,
  }
}

/// Decimal or `0x`-prefixed hexadecimal.
pub fn parse_address(raw: &str) -> Option<u64> {
  let raw = raw.trim();
  match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
    Some(hex) => u64::from_str_radix(hex, 16).ok(),
    None => raw.parse().ok(),
  }
}
