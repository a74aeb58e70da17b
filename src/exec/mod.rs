// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] holds command templates and single-process execution using
//!   `tokio::process::Command`.
//! - [`runner`] runs a template over a batch of files with bounded
//!   parallelism and aggregates every failure.
//! - [`tools`] wraps the runner for the three auxiliary tools (style lint,
//!   localization generator, messages check).

pub mod command;
pub mod runner;
pub mod tools;

pub use command::{CommandOutput, CommandTemplate, CommandVars, run_shell, shell_quote};
pub use runner::{BatchItem, BatchResult, run_batch};
