// src/sync/mod.rs

//! Fan-out directory sync.
//!
//! One source tree is replicated into several destination trees. Each
//! destination is planned and applied independently on the blocking pool, so
//! a failure in one never stops the others; failures are aggregated into a
//! single [`SyncFailure`].
//!
//! In mirror mode entries present only in a destination are deleted. Files
//! whose size and blake3 hash already match are left alone, so repeating a
//! sync is a no-op.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::errors::{DestinationFailure, SyncFailure};
use crate::fs::FileSystem;
use crate::types::SyncMode;

pub mod apply;
pub mod hash;
pub mod plan;

pub use apply::{DestinationReport, apply_plan};
pub use plan::{SyncPlan, plan_destination, validate_mapping};

/// A named source → destinations mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSpec {
    pub name: String,
    pub source: PathBuf,
    pub destinations: Vec<PathBuf>,
    pub mode: SyncMode,
}

/// Per-destination outcomes of a successful fan-out, in destination order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub source: PathBuf,
    pub destinations: Vec<DestinationReport>,
}

impl SyncReport {
    pub fn copied(&self) -> usize {
        self.destinations.iter().map(|d| d.copied).sum()
    }

    pub fn deleted(&self) -> usize {
        self.destinations.iter().map(|d| d.deleted).sum()
    }

    pub fn unchanged(&self) -> usize {
        self.destinations.iter().map(|d| d.unchanged).sum()
    }
}

/// Plan and apply one destination synchronously.
pub fn sync_destination(
    fs: &dyn FileSystem,
    source: &Path,
    destination: &Path,
    mode: SyncMode,
) -> Result<DestinationReport, DestinationFailure> {
    let fail = |message: String| DestinationFailure {
        destination: destination.to_path_buf(),
        message,
    };

    let plan = plan_destination(fs, source, destination, mode).map_err(|e| fail(format!("{e:#}")))?;
    apply_plan(fs, destination, &plan).map_err(|errors| fail(errors.join("; ")))
}

/// Replicate `source` into every destination.
///
/// `mirror` selects [`SyncMode::Mirror`] (delete extras) or
/// [`SyncMode::Additive`].
pub async fn sync(
    fs: Arc<dyn FileSystem>,
    source: &Path,
    destinations: &[PathBuf],
    mirror: bool,
) -> Result<SyncReport, SyncFailure> {
    let mode = SyncMode::from_mirror_flag(mirror);
    let mut set = JoinSet::new();

    for (index, destination) in destinations.iter().enumerate() {
        let fs = Arc::clone(&fs);
        let source = source.to_path_buf();
        let destination = destination.clone();
        set.spawn_blocking(move || {
            let outcome = sync_destination(fs.as_ref(), &source, &destination, mode);
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<Result<DestinationReport, DestinationFailure>>> =
        vec![None; destinations.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => warn!(error = %e, "sync worker panicked"),
        }
    }

    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for (slot, destination) in slots.into_iter().zip(destinations) {
        match slot {
            Some(Ok(report)) => reports.push(report),
            Some(Err(failure)) => failures.push(failure),
            None => failures.push(DestinationFailure {
                destination: destination.clone(),
                message: "sync worker panicked".to_string(),
            }),
        }
    }

    if failures.is_empty() {
        let report = SyncReport {
            source: source.to_path_buf(),
            destinations: reports,
        };
        info!(
            source = ?source,
            destinations = destinations.len(),
            copied = report.copied(),
            deleted = report.deleted(),
            unchanged = report.unchanged(),
            "sync finished"
        );
        Ok(report)
    } else {
        Err(SyncFailure {
            source_dir: source.to_path_buf(),
            failures,
        })
    }
}

/// Run a [`SyncSpec`].
pub async fn run_spec(fs: Arc<dyn FileSystem>, spec: &SyncSpec) -> Result<SyncReport, SyncFailure> {
    sync(fs, &spec.source, &spec.destinations, spec.mode.deletes()).await
}
