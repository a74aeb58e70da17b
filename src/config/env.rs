// src/config/env.rs

//! Environment-variable layer.
//!
//! Boolean toggles are on only for the literal value `true`.

use std::path::PathBuf;

pub const ENV_APP: &str = "BUILDWATCH_APP";
pub const ENV_PATH: &str = "BUILDWATCH_PATH";
pub const ENV_MINIFY: &str = "BUILDWATCH_MINIFY";
pub const ENV_MINIFY_FRAMEWORK: &str = "BUILDWATCH_MINIFY_FRAMEWORK";
pub const ENV_ANALYZE: &str = "BUILDWATCH_ANALYZE";
pub const ENV_PROD_SOURCEMAP: &str = "BUILDWATCH_PROD_SOURCEMAP";
pub const ENV_LIBRARY_PATH: &str = "BUILDWATCH_LIBRARY_PATH";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    pub app: Option<String>,
    /// Source path override for the application.
    pub path: Option<String>,
    pub minify: bool,
    pub minify_framework: bool,
    pub analyze: bool,
    pub prod_sourcemap: bool,
    /// Checkout of the externally built UI component library.
    pub library_path: Option<PathBuf>,
}

impl BuildEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup, so tests need not touch the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |key: &str| lookup(key).as_deref() == Some("true");

        Self {
            app: text(ENV_APP),
            path: text(ENV_PATH),
            minify: flag(ENV_MINIFY),
            minify_framework: flag(ENV_MINIFY_FRAMEWORK),
            analyze: flag(ENV_ANALYZE),
            prod_sourcemap: flag(ENV_PROD_SOURCEMAP),
            library_path: text(ENV_LIBRARY_PATH).map(PathBuf::from),
        }
    }
}
