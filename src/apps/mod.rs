// src/apps/mod.rs

//! The fixed set of applications and their resolved layout.
//!
//! An [`Application`] is resolved once per invocation from the app name, an
//! optional source path override and the client root, and is immutable
//! afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;

use crate::errors::BuildError;
use crate::watch::PatternSet;

pub mod bundle;
pub mod entries;

pub use bundle::{BundleDescriptor, DESCRIPTOR_FILE};
pub use entries::{CUSTOM_STARTUP, EntryGroup, EntryMap, inject_startup_file, resolve_entries};

/// Name of the directory holding all build outputs, under the client root.
pub const OUT_DIR: &str = "out";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AppName {
    Admin,
    Jetstream,
    Login,
    Api,
    Dxcore,
    Dxtest,
}

impl AppName {
    pub const ALL: [AppName; 6] = [
        AppName::Admin,
        AppName::Jetstream,
        AppName::Login,
        AppName::Api,
        AppName::Dxcore,
        AppName::Dxtest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppName::Admin => "admin",
            AppName::Jetstream => "jetstream",
            AppName::Login => "login",
            AppName::Api => "api",
            AppName::Dxcore => "dxcore",
            AppName::Dxtest => "dxtest",
        }
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppName {
    type Err = BuildError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        AppName::ALL
            .into_iter()
            .find(|app| app.as_str() == s.trim())
            .ok_or_else(|| {
                let known: Vec<_> = AppName::ALL.iter().map(|a| a.as_str()).collect();
                BuildError::ConfigError(format!(
                    "unknown application '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Output module for a source path: anything under `admin/` builds into the
/// admin output tree.
pub fn output_module(app: AppName, source_path: &str) -> String {
    if source_path.contains("admin/") {
        "admin".to_string()
    } else {
        app.as_str().to_string()
    }
}

/// Glob pattern sets per asset class, all anchored at the client root.
#[derive(Debug, Clone)]
pub struct AssetPatterns {
    pub copy: PatternSet,
    pub scripts: PatternSet,
    pub index_pages: PatternSet,
    pub message_catalogs: PatternSet,
    pub check_catalogs: PatternSet,
    pub lint: PatternSet,
    pub css: PatternSet,
    pub templates: PatternSet,
    pub angular_templates: PatternSet,
    pub styles: PatternSet,
    pub sass_styles: PatternSet,
    pub locale_copy: PatternSet,
    pub image_copy: PatternSet,
    /// Compiled outputs eligible for delete-sync, anchored at the app's
    /// output dir.
    pub compiled_outputs: PatternSet,
}

impl AssetPatterns {
    fn build(root: &Path, out_dir: &Path, app: AppName, path: &str, module: &str) -> Result<Self> {
        let set = |patterns: Vec<String>| PatternSet::new(root, &patterns);
        let excl_lib = format!("!{path}/**/{{lib,testout}}/**");

        let index_pages = if app == AppName::Admin {
            vec![
                "admin/index.html".to_string(),
                "admin/Server.html".to_string(),
                "admin/ServerSetup.html".to_string(),
                "admin/Setup.html".to_string(),
            ]
        } else {
            vec![format!("{path}/index.html")]
        };

        Ok(Self {
            copy: set(vec![
                format!("{path}/**/*.{{css,less,scss,ico,png,gif,ttf,woff,woff2,properties,map,svg}}"),
                format!("{path}/**/lib/**/*.js"),
                format!("!{path}/**/testout/**"),
            ])?,
            scripts: set(vec![
                format!("{path}/**/*.js"),
                format!("{path}/**/noTests-message.test"),
                excl_lib.clone(),
            ])?,
            index_pages: set(index_pages)?,
            message_catalogs: set(vec![format!("{path}/**/messages_en_US.properties")])?,
            check_catalogs: set(vec![
                format!("{}/**/messages_en_US.properties", app.as_str()),
                format!("!{OUT_DIR}/**/messages_en_US.properties"),
            ])?,
            lint: set(vec![
                format!("{path}/**/*.js"),
                format!("{path}/**/noTests-message.test"),
                excl_lib.clone(),
                "!*/build/**".to_string(),
            ])?,
            css: set(vec![format!("{path}/**/*.css"), excl_lib.clone()])?,
            templates: set(vec![format!("{path}/**/*.hjs")])?,
            angular_templates: set(vec![
                format!("{module}/**/*.html"),
                format!("!{module}/**/{{lib,testout}}/**"),
                format!("!{path}/index.html"),
            ])?,
            styles: set(vec![format!("{path}/**/*.{{less,css}}"), excl_lib.clone()])?,
            sass_styles: set(vec![format!("{path}/**/*.scss"), excl_lib])?,
            locale_copy: set(vec![format!("{path}/**/*.properties")])?,
            image_copy: set(vec![format!("{path}/**/*.svg")])?,
            compiled_outputs: PatternSet::new(
                out_dir,
                &[
                    "**/*.js",
                    "!lib/**/*.{js,css}",
                    "!templates.js",
                    "!ngTemplates.js",
                    "!**/delphix-schema.js",
                    "!js/*-bundle.js",
                ],
            )?,
        })
    }

    /// Every class with a display name, for dry-run output.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &PatternSet)> {
        [
            ("copy", &self.copy),
            ("scripts", &self.scripts),
            ("index_pages", &self.index_pages),
            ("message_catalogs", &self.message_catalogs),
            ("check_catalogs", &self.check_catalogs),
            ("lint", &self.lint),
            ("css", &self.css),
            ("templates", &self.templates),
            ("angular_templates", &self.angular_templates),
            ("styles", &self.styles),
            ("sass_styles", &self.sass_styles),
            ("locale_copy", &self.locale_copy),
            ("image_copy", &self.image_copy),
            ("compiled_outputs", &self.compiled_outputs),
        ]
        .into_iter()
    }
}

/// Resolved application layout.
#[derive(Debug, Clone)]
pub struct Application {
    pub name: AppName,
    /// Source path relative to the client root (the app name unless
    /// overridden).
    pub source_path: String,
    /// Output module; see [`output_module`].
    pub module: String,
    pub root: PathBuf,
    pub assets: AssetPatterns,
    pub entries: EntryMap,
}

impl Application {
    /// Resolve the layout for `name` under `root`.
    ///
    /// `test_file` is the optional `--file` value used for startup-file
    /// injection.
    pub fn resolve(
        name: AppName,
        path_override: Option<&str>,
        root: &Path,
        test_file: Option<&str>,
    ) -> Result<Self> {
        let source_path = path_override
            .map(|p| p.trim().trim_end_matches('/'))
            .filter(|p| !p.is_empty())
            .unwrap_or(name.as_str())
            .to_string();
        let module = output_module(name, &source_path);
        let out_dir = root.join(OUT_DIR).join(&module);

        let assets = AssetPatterns::build(root, &out_dir, name, &source_path, &module)?;

        let mut entries = resolve_entries(name);
        inject_startup_file(&mut entries, name, &source_path, test_file);

        Ok(Self {
            name,
            source_path,
            module,
            root: root.to_path_buf(),
            assets,
            entries,
        })
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.source_path)
    }

    pub fn out_root(&self) -> PathBuf {
        self.root.join(OUT_DIR)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.out_root().join(&self.module)
    }

    pub fn js_out_dir(&self) -> PathBuf {
        self.out_dir().join("js")
    }

    pub fn templates_output(&self) -> PathBuf {
        self.out_dir().join("templates.js")
    }

    pub fn angular_templates_output(&self) -> PathBuf {
        self.out_dir().join("ngTemplates.js")
    }

    pub fn styles_output(&self) -> PathBuf {
        self.out_dir().join("style").join("styles.css")
    }

    pub fn sass_styles_output(&self) -> PathBuf {
        self.out_dir().join("style").join("styles-scss.css")
    }

    pub fn styles_entry(&self) -> PathBuf {
        self.source_dir().join("style").join("styles.less")
    }

    pub fn sass_entry(&self) -> PathBuf {
        self.source_dir().join("style").join("styles.scss")
    }

    pub fn testout_dir(&self) -> PathBuf {
        self.source_dir().join("testout")
    }

    pub fn bundle_descriptor_path(&self) -> PathBuf {
        self.out_dir().join(DESCRIPTOR_FILE)
    }
}
