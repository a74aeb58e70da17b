// src/engine/mod.rs

//! Watch dispatcher.
//!
//! This module ties together:
//! - the binding table (which paths trigger which chain)
//! - the per-binding debounce / pending-run state machine
//! - the main event loop that reacts to:
//!   - filesystem changes
//!   - debounce timers
//!   - chain completions
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`], and chains are run through the
//! [`executor::ChainExecutor`] seam.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tasks::ChainKey;
use crate::types::ChangeKind;
use crate::watch::PatternSet;

pub mod core;
pub mod executor;
pub mod runtime;

pub use core::{CoreStep, DispatchCore};
pub use executor::{ChainExecutor, ChainFuture, OrchestratorExecutor};
pub use runtime::Dispatcher;

/// Index of a binding in the dispatcher's binding table.
pub type BindingId = usize;

/// Which change kinds a binding reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    Any,
    DeletedOnly,
}

impl EventFilter {
    pub fn accepts(self, kind: ChangeKind) -> bool {
        match self {
            EventFilter::Any => true,
            EventFilter::DeletedOnly => kind == ChangeKind::Removed,
        }
    }
}

/// One row of the binding table: changes matching `patterns` run `chain`.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub patterns: Vec<PatternSet>,
    pub chain: ChainKey,
    /// Keep the proxy paused for the whole run.
    pub gate_proxy: bool,
    pub events: EventFilter,
}

impl Binding {
    pub fn new(name: impl Into<String>, patterns: Vec<PatternSet>, chain: ChainKey) -> Self {
        Self {
            name: name.into(),
            patterns,
            chain,
            gate_proxy: false,
            events: EventFilter::Any,
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate_proxy = true;
        self
    }

    pub fn on(mut self, events: EventFilter) -> Self {
        self.events = events;
        self
    }

    /// Returns true if a `kind` change to `path` should trigger this binding.
    pub fn matches(&self, path: &Path, kind: ChangeKind) -> bool {
        self.events.accepts(kind) && self.patterns.iter().any(|set| set.matches_path(path))
    }
}

/// Events flowing into the dispatcher from the watcher, timers and chain
/// runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// A watched path changed.
    PathChanged { path: PathBuf, kind: ChangeKind },
    /// A debounce timer fired. Stale generations are ignored.
    DebounceElapsed { binding: BindingId, generation: u64 },
    /// A binding's chain run ended.
    ChainFinished { binding: BindingId, success: bool },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Command produced by the pure core, executed by the async shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchCommand {
    /// Deliver `DebounceElapsed { binding, generation }` after `after`.
    ScheduleDebounce {
        binding: BindingId,
        generation: u64,
        after: Duration,
    },
    /// Run the binding's chain.
    StartChain { binding: BindingId },
}
