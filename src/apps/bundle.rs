// src/apps/bundle.rs

//! Bundle descriptor handed to the external bundler.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use super::{Application, EntryMap};
use crate::fs::FileSystem;
use crate::types::ModeFlags;

pub const DESCRIPTOR_FILE: &str = "bundle-descriptor.json";
pub const BUNDLE_FILENAME: &str = "[name]-bundle.js";
pub const FRAMEWORK_BUNDLE: &str = "vendorAngular-bundle.js";

/// Shared-chunk names, in the order the bundler must split them.
pub const SHARED_CHUNKS: &[&str] = &["adminShared", "dxGUI", "vendorAngular", "vendor"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Devtool {
    #[serde(rename = "sourcemap")]
    SourceMap,
    CheapModuleEvalSourceMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleDescriptor {
    pub app: String,
    pub entries: EntryMap,
    pub output_dir: PathBuf,
    pub filename: String,
    pub shared_chunks: Vec<String>,
    pub devtool: Devtool,
    pub minify: bool,
    /// Bundle file to minify on its own, when requested.
    pub minify_framework_bundle: Option<String>,
    pub analyze: bool,
}

impl BundleDescriptor {
    /// `None` for apps without entries.
    pub fn for_app(app: &Application, flags: &ModeFlags) -> Option<Self> {
        if app.entries.is_empty() {
            return None;
        }

        let shared_chunks = SHARED_CHUNKS
            .iter()
            .filter(|name| app.entries.contains(name))
            .map(|name| name.to_string())
            .collect();

        Some(Self {
            app: app.name.to_string(),
            entries: app.entries.clone(),
            output_dir: app.js_out_dir(),
            filename: BUNDLE_FILENAME.to_string(),
            shared_chunks,
            devtool: if flags.production_source_maps {
                Devtool::SourceMap
            } else {
                Devtool::CheapModuleEvalSourceMap
            },
            minify: flags.minify,
            minify_framework_bundle: flags
                .minify_framework_bundle
                .then(|| FRAMEWORK_BUNDLE.to_string()),
            analyze: flags.analyze,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing bundle descriptor")
    }

    pub fn write(&self, fs: &dyn FileSystem, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs.write(path, json.as_bytes())?;
        debug!(path = ?path, "bundle descriptor written");
        Ok(())
    }
}
