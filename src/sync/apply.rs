// src/sync/apply.rs

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::sync::plan::SyncPlan;
use crate::watch::path_utils::is_within;

/// Outcome of applying one plan to one destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationReport {
    pub destination: PathBuf,
    pub copied: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// Apply `plan` to `destination`: deletions first, then copies.
///
/// Every operation is attempted; the errors of the ones that failed are
/// returned together.
pub fn apply_plan(
    fs: &dyn FileSystem,
    destination: &Path,
    plan: &SyncPlan,
) -> Result<DestinationReport, Vec<String>> {
    let mut report = DestinationReport {
        destination: destination.to_path_buf(),
        unchanged: plan.unchanged,
        ..Default::default()
    };
    let mut errors = Vec::new();

    if !fs.is_dir(destination) {
        if let Err(e) = fs.create_dir_all(destination) {
            return Err(vec![format!("{e:#}")]);
        }
    }

    for path in &plan.deletions {
        if !is_within(destination, path) || path.as_path() == destination {
            errors.push(format!("refusing to delete {:?} outside {:?}", path, destination));
            continue;
        }
        let removed = if fs.is_dir(path) && !fs.is_symlink(path) {
            fs.remove_dir_all(path)
        } else {
            fs.remove_file(path)
        };
        match removed {
            Ok(()) => {
                debug!(path = ?path, "deleted");
                report.deleted += 1;
            }
            Err(e) => errors.push(format!("{e:#}")),
        }
    }

    for (src, dst) in &plan.copies {
        match fs.copy_file(src, dst) {
            Ok(()) => {
                debug!(from = ?src, to = ?dst, "copied");
                report.copied += 1;
            }
            Err(e) => errors.push(format!("{e:#}")),
        }
    }

    if errors.is_empty() {
        Ok(report)
    } else {
        warn!(
            destination = ?destination,
            failed = errors.len(),
            "sync destination finished with errors"
        );
        Err(errors)
    }
}
