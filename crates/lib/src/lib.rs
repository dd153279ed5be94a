//! projsys-lib: build orchestration and project configuration
//!
//! This crate provides the project system behind an IDE's project node:
//! - `config`: canonical configuration keys and the configuration registry
//! - `property`: the property store with change notification and the edit gate
//! - `output`: output groups and their lazily built outputs
//! - `build`: the build coordinator gating every submission to the engine
//! - `project`: the project node, configuration façades, buildable adapters,
//!   launch settings and transactional item mutations
//! - `engine`: the in-process build engine the coordinator submits to

pub mod build;
pub mod config;
pub mod consts;
pub mod engine;
pub mod output;
pub mod project;
pub mod property;
pub mod settings;
pub mod transaction;
pub mod ui;
pub mod util;
