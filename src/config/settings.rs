// src/config/settings.rs

//! Final per-invocation settings: config file, environment and CLI merged.
//!
//! Precedence: an explicit CLI value wins over the environment; boolean mode
//! toggles are on if either layer turns them on.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::apps::{AppName, Application};
use crate::cli::CliArgs;
use crate::config::env::{BuildEnv, ENV_APP};
use crate::config::loader::{load_and_validate, resolve_config_path};
use crate::config::model::ConfigFile;
use crate::config::validate::validate_proxy;
use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::proxy::ProxyConfig;
use crate::tasks::Purpose;
use crate::types::ModeFlags;

#[derive(Debug, Clone)]
pub struct Settings {
    pub app: AppName,
    pub path_override: Option<String>,
    pub root: PathBuf,
    pub flags: ModeFlags,
    /// `--file`: test file used for startup-file injection.
    pub test_file: Option<String>,
    /// Checkout of the external UI component library, when enabled.
    pub library_path: Option<PathBuf>,
    /// Run only this chain instead of the full build.
    pub only: Option<Purpose>,
    pub dry_run: bool,
    pub config_path: PathBuf,
    pub config: ConfigFile,
    pub proxy: Option<ProxyConfig>,
}

impl Settings {
    pub fn resolve(args: &CliArgs, env: &BuildEnv, fs: &dyn FileSystem) -> Result<Self> {
        let root = PathBuf::from(args.root.as_deref().unwrap_or("."));
        let config_path = resolve_config_path(&root, &args.config);
        let config = load_and_validate(fs, &config_path)?;

        check_root_dir_name(fs, &root, &config.orchestrator.root_dir_name)?;

        let app_name = args.app.as_deref().or(env.app.as_deref()).ok_or_else(|| {
            BuildError::ConfigError(format!(
                "no application given (use --app or set {ENV_APP})"
            ))
        })?;
        let app: AppName = app_name.parse()?;

        let only = args.only.as_deref().map(str::parse::<Purpose>).transpose()?;

        let flags = ModeFlags {
            minify: args.minify || env.minify,
            minify_framework_bundle: args.minify_framework || env.minify_framework,
            analyze: args.analyze || env.analyze,
            production_source_maps: args.prod_sourcemap || env.prod_sourcemap,
            watch: args.watch,
        };

        let proxy = match (&args.proxy_listen, &args.proxy_upstream) {
            (Some(listen), Some(upstream)) => {
                let proxy = ProxyConfig {
                    listen: listen.clone(),
                    upstream: upstream.clone(),
                };
                validate_proxy(&proxy)?;
                Some(proxy)
            }
            (None, None) => config.proxy.clone(),
            _ => {
                return Err(BuildError::ConfigError(
                    "--proxy-listen and --proxy-upstream must be given together".to_string(),
                ));
            }
        };

        let library_path = env.library_path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        });

        let settings = Self {
            app,
            path_override: env.path.clone(),
            root,
            flags,
            test_file: args.file.clone(),
            library_path,
            only,
            dry_run: args.dry_run,
            config_path,
            config,
            proxy,
        };
        debug!(app = %settings.app, root = ?settings.root, flags = ?settings.flags, "settings resolved");
        Ok(settings)
    }

    /// Resolve the application layout for these settings.
    pub fn application(&self) -> Result<Application> {
        Ok(Application::resolve(
            self.app,
            self.path_override.as_deref(),
            &self.root,
            self.test_file.as_deref(),
        )?)
    }
}

/// The orchestrator must run from a directory named `expected` (empty
/// disables the check).
pub fn check_root_dir_name(fs: &dyn FileSystem, root: &Path, expected: &str) -> Result<()> {
    if expected.is_empty() {
        return Ok(());
    }
    let canonical = fs.canonicalize(root)?;
    let actual = canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if actual != expected {
        return Err(BuildError::ConfigError(format!(
            "needs to be run from the '{expected}' directory, but the root is {}",
            canonical.display()
        )));
    }
    Ok(())
}
