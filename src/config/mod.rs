// src/config/mod.rs

//! Optional configuration file for within.
//!
//! - `model.rs`: the TOML data model and its validation into [`ConfigFile`].
//! - `loader.rs`: locating (`--config` / `WITHIN_CONFIG`) and reading the file.

pub mod loader;
pub mod model;

pub use loader::{CONFIG_ENV, load_and_validate, load_from_path, load_settings};
pub use model::{ConfigFile, RawConfigFile};
