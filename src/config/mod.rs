// src/config/mod.rs

//! Configuration for buildwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it and fill in defaults (`validate.rs`).
//! - Read the environment toggles (`env.rs`).
//! - Merge file, environment and CLI into [`Settings`] (`settings.rs`).

pub mod env;
pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use env::BuildEnv;
pub use loader::{DEFAULT_CONFIG_FILE, load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, Orchestrator, RawConfigFile, Tools};
pub use settings::{Settings, check_root_dir_name};
pub use validate::parse_duration;
