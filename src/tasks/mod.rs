// src/tasks/mod.rs

//! Tasks, the registry that names them, and chains composed from them.
//!
//! - [`registry`]: task/chain registration and fail-fast chain execution.
//! - [`builtin`]: the task kinds the orchestrator knows how to run.
//! - [`catalog`]: builds the registry, chains and watch bindings for one
//!   resolved application.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::proxy::ProxyGate;
use crate::types::EmptyInputPolicy;

pub mod builtin;
pub mod catalog;
pub mod registry;

pub use catalog::{Catalog, build_catalog};
pub use registry::{Chain, ChainKey, Purpose, Step, Target, TaskRegistry};

/// Boxed future returned by [`Task::run`].
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Everything a running task may touch.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub fs: Arc<dyn FileSystem>,
    pub gate: ProxyGate,
    /// Client root; external commands run here.
    pub root: PathBuf,
    /// Process limit for batch tools.
    pub concurrency: usize,
    pub empty_inputs: EmptyInputPolicy,
}

/// An executable unit registered under a unique name.
///
/// Tasks must be safe to re-run with unchanged inputs: they overwrite their
/// outputs, never append.
pub trait Task: Send + Sync + fmt::Debug {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a>;

    /// One-line description for dry-run output.
    fn describe(&self) -> String;
}
