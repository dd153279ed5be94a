//! Well-known names shared across the crate.

pub const APP_NAME: &str = "projsys";

/// Global properties selecting the configuration being evaluated.
pub const CONFIGURATION_PROPERTY: &str = "Configuration";
pub const PLATFORM_PROPERTY: &str = "Platform";

/// Global properties stamped on every build submission.
pub const MANDATORY_BUILD_PROPERTIES: &[(&str, &str)] = &[
  ("VisualStudioStyleErrors", "true"),
  ("UTFOutput", "true"),
  ("BuildingInsideVisualStudio", "true"),
];

pub const BUILD_TARGET: &str = "Build";
pub const REBUILD_TARGET: &str = "Rebuild";
pub const CLEAN_TARGET: &str = "Clean";

/// Target built before any output group target, when the project defines it.
pub const ALL_OUTPUT_GROUPS_TARGET: &str = "AllProjectOutputGroups";

/// Design-time target used to refresh reference resolution after item mutations.
pub const RESOLVE_REFERENCES_TARGET: &str = "ResolveAssemblyReferences";

/// Item type holding assembly references.
pub const REFERENCE_ITEM: &str = "Reference";

/// Metadata linking a dependent file to its parent item.
pub const DEPENDENT_UPON_METADATA: &str = "DependentUpon";

/// Length of the truncated snapshot fingerprint.
pub const FINGERPRINT_PREFIX_LEN: usize = 16;
