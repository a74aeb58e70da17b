// src/watch/mod.rs

//! File watching and pattern matching.
//!
//! This module is responsible for:
//! - Compiling include / `!`exclude glob lists anchored at a base directory.
//! - Resolving them to concrete file lists for tasks and staleness checks.
//! - Wiring up a cross-platform filesystem watcher (`notify`) that feeds the
//!   dispatcher.
//!
//! It does **not** know about chains; bindings in `engine` decide what a
//! change triggers.

pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::{IGNORED_DIRS, PatternSet};
pub use watcher::{WatchRoot, WatcherHandle, classify, rebase, spawn_watcher, watch_roots};
