// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Every mode flag can also be switched on through its environment variable
//! (see [`crate::config::env`]); the flags here only ever turn things on.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `buildwatch`.
#[derive(Debug, Clone, Parser, Default)]
#[command(
    name = "buildwatch",
    version,
    about = "Incremental multi-application build orchestrator with watch mode and library sync.",
    long_about = None
)]
pub struct CliArgs {
    /// Application to build (admin, jetstream, login, api, dxcore, dxtest).
    ///
    /// Falls back to `BUILDWATCH_APP` when omitted.
    #[arg(long, value_name = "NAME")]
    pub app: Option<String>,

    /// Run only this chain of the application (e.g. `styles`, `checkstyle`).
    #[arg(long, value_name = "PURPOSE")]
    pub only: Option<String>,

    /// Minify the output bundles.
    #[arg(long)]
    pub minify: bool,

    /// Minify only the framework vendor bundle.
    #[arg(long)]
    pub minify_framework: bool,

    /// Enable bundle analysis.
    #[arg(long)]
    pub analyze: bool,

    /// Emit production-quality source maps.
    #[arg(long)]
    pub prod_sourcemap: bool,

    /// Keep running and rebuild on file changes.
    #[arg(long)]
    pub watch: bool,

    /// Client root directory (defaults to the current directory).
    #[arg(long, value_name = "DIR")]
    pub root: Option<String>,

    /// Path to the tool configuration (TOML). Missing file means defaults.
    #[arg(long, value_name = "PATH", default_value = "Buildwatch.toml")]
    pub config: String,

    /// Test file whose application gets the custom startup entry injected.
    #[arg(long, value_name = "PATH")]
    pub file: Option<String>,

    /// Address the development proxy listens on.
    #[arg(long, value_name = "ADDR")]
    pub proxy_listen: Option<String>,

    /// Address of the development server behind the proxy.
    #[arg(long, value_name = "ADDR")]
    pub proxy_upstream: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print chains and bindings, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
