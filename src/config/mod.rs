// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] mirrors the TOML layout (`[config]`, `[queue]`, `[[job]]`).
//! - [`loader`] reads files and resolves paths.
//! - [`validate`] turns a `RawConfigFile` into a checked `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    DEFAULT_CONFIG_FILE, config_root_dir, load_and_validate, load_from_path, load_from_str,
};
pub use model::{ConfigFile, ConfigSection, JobConfig, QueueSection, RawConfigFile};
