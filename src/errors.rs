// src/errors.rs

//! Crate-wide error type and aliases.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("staleness check failed for {path:?}: {source}")]
    Staleness {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Chain not found: {0}")]
    ChainNotFound(String),

    #[error("chain {chain} stopped at task '{task}': {source}")]
    ChainFailed {
        chain: String,
        task: String,
        #[source]
        source: Box<BuildError>,
    },

    #[error("cannot relocate {from:?} to {to:?}: {reason}")]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error(transparent)]
    Batch(#[from] BatchFailure),

    #[error(transparent)]
    Sync(#[from] SyncFailure),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    pub fn task_failed(task: impl Into<String>, message: impl Into<String>) -> Self {
        BuildError::TaskFailed {
            task: task.into(),
            message: message.into(),
        }
    }
}

/// One failing item of a process batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    /// Input file (or the joined file list for batched invocations).
    pub file: PathBuf,
    /// Exit code, `None` if the process could not be spawned or was killed.
    pub exit_code: Option<i32>,
    /// Captured stdout + stderr.
    pub output: String,
}

/// Every failing item of a batch, in input order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub command: String,
    pub failures: Vec<FailedItem>,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of the inputs failed for `{}`:",
            self.failures.len(),
            self.command
        )?;
        for item in &self.failures {
            let code = item
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string());
            write!(f, "\n  {} (exit {code})", item.file.display())?;
            for line in item.output.lines() {
                write!(f, "\n    {line}")?;
            }
        }
        Ok(())
    }
}

/// A failure applying one sync mapping to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationFailure {
    pub destination: PathBuf,
    pub message: String,
}

/// Aggregated per-destination failures of one fan-out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub source_dir: PathBuf,
    pub failures: Vec<DestinationFailure>,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sync from {} failed for {} destination(s):",
            self.source_dir.display(),
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(
                f,
                "\n  {}: {}",
                failure.destination.display(),
                failure.message
            )?;
        }
        Ok(())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
