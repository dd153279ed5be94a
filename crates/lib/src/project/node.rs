//! A loaded project.
//!
//! [`ProjectNode`] ties the property store, the configuration registry, the
//! build coordinator and the item hierarchy of one project file together. It
//! lives on the UI context; builds leave it only through the coordinator.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::{debug, info};

use crate::build::{
  BuildCoordinator, BuildError, BuildMode, BuildRequest, BuildResult, HostBuildManager, IdeBuildLogger, MemorySink,
  OutputSink, SharedHostBuildManager, Submitted, Verbosity,
};
use crate::config::{ConfigurationKey, ConfigurationRegistry, DISPLAY_ANY_CPU};
use crate::consts::CLEAN_TARGET;
use crate::engine::{BuildEngine, EngineLogger, PropertyMap};
use crate::output::OutputBuilder;
use crate::property::{AllowAllEdits, EditGate, PropertyStore};
use crate::settings::Settings;
use crate::ui::UiContext;

use super::ProjectError;
use super::buildable::BuildableConfiguration;
use super::commands::{self, CommandDispatcher};
use super::configuration::ProjectConfiguration;
use super::documents::{DocumentTracker, NoDocuments};
use super::hierarchy::{Hierarchy, ItemNode};
use super::references::{ProjectReferences, ReferenceContainer, refresh_all};
use super::rename::{RenameError, RenameOutcome};

/// Collaborators a project is loaded with.
pub struct ProjectServices {
  pub engine: BuildEngine,
  /// `None` when not embedded in a host; builds then use engine build sessions.
  pub host: Option<Arc<dyn HostBuildManager>>,
  pub ui: Rc<UiContext>,
  pub gate: Rc<dyn EditGate>,
  pub documents: Rc<dyn DocumentTracker>,
  /// Defaults to the project's own `Reference` items.
  pub references: Option<Rc<dyn ReferenceContainer>>,
  pub output: Arc<dyn OutputSink>,
  pub verbosity: Verbosity,
  pub shell: String,
  pub global_properties: PropertyMap,
}

impl ProjectServices {
  pub fn new(engine: BuildEngine, ui: Rc<UiContext>) -> Self {
    Self {
      engine,
      host: None,
      ui,
      gate: Rc::new(AllowAllEdits),
      documents: Rc::new(NoDocuments),
      references: None,
      output: Arc::new(MemorySink::new()),
      verbosity: Verbosity::default(),
      shell: Settings::default().shell,
      global_properties: PropertyMap::new(),
    }
  }

  /// Services configured from `settings`, with an in-process host build manager unless disabled.
  pub fn from_settings(settings: &Settings, engine: BuildEngine, ui: Rc<UiContext>) -> Self {
    let host: Option<Arc<dyn HostBuildManager>> = if settings.host_build_manager {
      Some(SharedHostBuildManager::new(engine.clone()))
    } else {
      None
    };
    Self {
      host,
      verbosity: settings.verbosity,
      shell: settings.shell.clone(),
      ..Self::new(engine, ui)
    }
  }
}

pub struct ProjectNode {
  self_ref: Weak<ProjectNode>,
  store: Rc<PropertyStore>,
  registry: ConfigurationRegistry,
  coordinator: BuildCoordinator,
  hierarchy: Hierarchy,
  configurations: RefCell<Vec<Rc<ProjectConfiguration>>>,
  references: Rc<dyn ReferenceContainer>,
  documents: Rc<dyn DocumentTracker>,
  output: Arc<dyn OutputSink>,
  verbosity: Verbosity,
  shell: String,
}

impl std::fmt::Debug for ProjectNode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProjectNode")
      .field("store", &self.store)
      .field("build_in_progress", &self.coordinator.build_in_progress())
      .finish()
  }
}

impl ProjectNode {
  /// Load the project at `path`.
  ///
  /// The active configuration comes from the `Configuration`/`Platform`
  /// global properties when given, else the first declared configuration.
  pub fn load(path: &Path, services: ProjectServices) -> Result<Rc<Self>, ProjectError> {
    let path = dunce::canonicalize(path).map_err(|source| ProjectError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let store = Rc::new(PropertyStore::load(&path, services.global_properties, services.gate)?);
    let registry = ConfigurationRegistry::new(store.clone());
    if store.active_configuration().config().is_empty() {
      let initial = registry
        .configurations()
        .into_iter()
        .next()
        .unwrap_or_else(|| ConfigurationKey::new("Debug", DISPLAY_ANY_CPU));
      store.set_active_configuration(&initial);
    }

    let hierarchy = Hierarchy::new(&store.project_dir());
    hierarchy.populate(store.live_instance().all_items());
    let references = services
      .references
      .unwrap_or_else(|| Rc::new(ProjectReferences::new(store.clone())));
    let coordinator = BuildCoordinator::new(services.engine, services.host, services.ui);

    info!(
      path = %path.display(),
      configuration = %store.active_configuration(),
      items = hierarchy.all().len(),
      "project loaded"
    );
    Ok(Rc::new_cyclic(|self_ref| Self {
      self_ref: self_ref.clone(),
      store,
      registry,
      coordinator,
      hierarchy,
      configurations: RefCell::new(Vec::new()),
      references,
      documents: services.documents,
      output: services.output,
      verbosity: services.verbosity,
      shell: services.shell,
    }))
  }

  pub fn path(&self) -> PathBuf {
    self.store.path()
  }

  pub fn project_dir(&self) -> PathBuf {
    self.store.project_dir()
  }

  pub fn store(&self) -> &Rc<PropertyStore> {
    &self.store
  }

  pub fn registry(&self) -> &ConfigurationRegistry {
    &self.registry
  }

  pub fn coordinator(&self) -> &BuildCoordinator {
    &self.coordinator
  }

  pub fn hierarchy(&self) -> &Hierarchy {
    &self.hierarchy
  }

  pub fn documents(&self) -> &Rc<dyn DocumentTracker> {
    &self.documents
  }

  pub fn references(&self) -> &Rc<dyn ReferenceContainer> {
    &self.references
  }

  pub fn is_dirty(&self) -> bool {
    self.store.is_dirty()
  }

  pub fn save(&self) -> Result<(), ProjectError> {
    Ok(self.store.save()?)
  }

  pub fn save_as(&self, path: &Path) -> Result<(), ProjectError> {
    Ok(self.store.save_as(path)?)
  }

  /// Discard unsaved edits and re-read the project file.
  pub fn reload(&self) -> Result<(), ProjectError> {
    self.store.reload()?;
    self.hierarchy.populate(self.store.live_instance().all_items());
    Ok(())
  }

  pub fn active_configuration(&self) -> ConfigurationKey {
    self.store.active_configuration()
  }

  /// Make `key` the active configuration.
  ///
  /// Fails while a build pinned to a different configuration is in progress.
  pub fn set_active_configuration(&self, key: &ConfigurationKey) -> Result<(), ProjectError> {
    if self.coordinator.build_in_progress()
      && let Some(active) = self.coordinator.building_configuration()
      && active != *key
    {
      return Err(
        BuildError::ConfigurationMismatch {
          active,
          requested: key.clone(),
        }
        .into(),
      );
    }
    self.store.set_active_configuration(key);
    Ok(())
  }

  pub fn get_project_property(&self, name: &str, reset_cache: bool) -> Option<String> {
    self.store.get(name, reset_cache)
  }

  pub fn set_project_property(&self, name: &str, value: &str) -> Result<(), ProjectError> {
    self.store.set(name, value)?;
    Ok(())
  }

  /// The façade for `key`, created on first use and shared afterwards.
  pub fn configuration(&self, key: &ConfigurationKey) -> Rc<ProjectConfiguration> {
    if let Some(existing) = self.configurations.borrow().iter().find(|c| c.key() == key) {
      return existing.clone();
    }
    let created = ProjectConfiguration::new(key.clone(), self.store.clone(), self.coordinator.clone(), &self.shell);
    self.configurations.borrow_mut().push(created.clone());
    created
  }

  /// A buildable adapter for `key`. Each adapter keeps its own subscribers.
  pub fn buildable(&self, key: &ConfigurationKey) -> Result<BuildableConfiguration, ProjectError> {
    Ok(BuildableConfiguration::new(self.this()?, key.clone()))
  }

  pub fn build_in_progress(&self) -> bool {
    self.coordinator.build_in_progress()
  }

  /// Build `target`, or the default targets, for `key` and wait for the result.
  pub fn build(&self, key: &ConfigurationKey, target: Option<&str>) -> Result<BuildResult, ProjectError> {
    self.set_active_configuration(key)?;
    let request = BuildRequest::new(key.clone(), target, BuildMode::Sync);
    let snapshot = self.configuration(key).snapshot();
    match self.coordinator.submit(request, snapshot, Some(self.build_logger()))? {
      Submitted::Completed(result) => Ok(result),
      Submitted::Pending => Ok(BuildResult::failed(None)),
    }
  }

  /// Start a build on the engine's workers. `on_complete` runs on the UI context.
  ///
  /// If the build cannot be submitted, `on_complete` has already run with a
  /// failed result when the error is returned.
  pub fn build_async(
    &self,
    key: &ConfigurationKey,
    target: Option<&str>,
    on_complete: impl FnOnce(&BuildResult) + 'static,
  ) -> Result<(), ProjectError> {
    if let Err(e) = self.set_active_configuration(key) {
      on_complete(&BuildResult::failed(None));
      return Err(e);
    }
    let request = BuildRequest::new(key.clone(), target, BuildMode::Async).on_complete(on_complete);
    let snapshot = self.configuration(key).snapshot();
    self.coordinator.submit(request, snapshot, Some(self.build_logger()))?;
    Ok(())
  }

  /// Make sure the output directory exists; on clean, run `Clean` first if defined.
  pub fn prepare_build(&self, key: &ConfigurationKey, clean: bool) -> Result<(), ProjectError> {
    let configuration = self.configuration(key);
    if clean && configuration.has_target(CLEAN_TARGET) {
      self.call_msbuild(key, CLEAN_TARGET)?;
    }
    let output_path = configuration.options().output_path;
    std::fs::create_dir_all(&output_path).map_err(|source| ProjectError::Io {
      path: output_path.clone(),
      source,
    })?;
    debug!(path = %output_path.display(), "output directory ready");
    Ok(())
  }

  /// Build `target` now, or defer it while evaluation is suspended.
  pub fn call_msbuild(&self, key: &ConfigurationKey, target: &str) -> Result<BuildResult, ProjectError> {
    if self.coordinator.defer_if_suspended(key, target) {
      debug!(configuration = %key, target, "build deferred until resume");
      return Ok(BuildResult::suspended());
    }
    self.build(key, Some(target))
  }

  pub fn suspend_msbuild(&self) {
    self.coordinator.suspend_msbuild();
  }

  /// Leave a suspend scope. At the outermost resume, a deferred build runs
  /// once, for the last configuration and target requested while suspended.
  pub fn resume_msbuild(&self, key: &ConfigurationKey, target: &str) -> Result<Option<BuildResult>, ProjectError> {
    let Some(deferred) = self.coordinator.resume_msbuild() else {
      return Ok(None);
    };
    info!(
      configuration = %deferred.key,
      target = %deferred.target,
      resumed_configuration = %key,
      resumed_target = target,
      "replaying deferred build"
    );
    self.call_msbuild(&deferred.key, &deferred.target).map(Some)
  }

  /// Ask every reference to re-resolve. Returns how many did.
  pub fn refresh_references(&self) -> usize {
    refresh_all(self.references.as_ref())
  }

  pub fn rename_document(&self, old: &Path, new: &Path) -> Result<RenameOutcome, RenameError> {
    super::rename::rename_document(self, old, new)
  }

  /// Add an existing file as an item, copying it into the project directory when it lives elsewhere.
  pub fn add_existing_item(&self, source: &Path, item_type: &str) -> Result<Rc<ItemNode>, ProjectError> {
    super::items::add_existing_item(self, source, item_type)
  }

  pub fn remove_item(&self, node: &Rc<ItemNode>, delete_from_disk: bool) -> Result<(), ProjectError> {
    super::items::remove_item(self, node, delete_from_disk)
  }

  /// The command chain for this project.
  pub fn commands(&self) -> CommandDispatcher {
    commands::project_commands(self.self_ref.clone())
  }

  fn build_logger(&self) -> Arc<dyn EngineLogger> {
    Arc::new(IdeBuildLogger::new(self.output.clone(), self.verbosity))
  }

  fn this(&self) -> Result<Rc<Self>, ProjectError> {
    self.self_ref.upgrade().ok_or(ProjectError::Closed)
  }
}
