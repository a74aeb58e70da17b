// src/sync/plan.rs

//! Per-destination sync planning: the set difference between a source tree
//! and one destination tree.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use tracing::debug;

use crate::fs::FileSystem;
use crate::sync::hash::files_identical;
use crate::types::SyncMode;
use crate::watch::path_utils::{is_within, lexical_normalize};

/// What applying one mapping to one destination will do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Destination entries to remove (files, symlinks or whole directories).
    /// Always inside the destination root.
    pub deletions: Vec<PathBuf>,
    /// `(source file, destination file)` pairs to copy.
    pub copies: Vec<(PathBuf, PathBuf)>,
    /// Source files whose destination copy is already identical.
    pub unchanged: usize,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.deletions.is_empty() && self.copies.is_empty()
    }
}

/// Source tree listing, relative to the source root.
#[derive(Debug, Default)]
struct Listing {
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
}

/// Reject mappings whose mirror deletions could reach outside the intended
/// subtree.
pub fn validate_mapping(source: &Path, destination: &Path) -> Result<()> {
    let source_n = lexical_normalize(source);
    let dest_n = lexical_normalize(destination);

    // `/`, `.`, `..`, `../..` all name a root or an ancestor of the working dir.
    if !dest_n.components().any(|c| matches!(c, Component::Normal(_))) {
        bail!("refusing to sync into a root or parent directory {:?}", destination);
    }
    if dest_n == source_n {
        bail!("destination {:?} is the source itself", destination);
    }
    if is_within(&dest_n, &source_n) {
        bail!("destination {:?} contains the source {:?}", destination, source);
    }
    if is_within(&source_n, &dest_n) {
        bail!("destination {:?} lies inside the source {:?}", destination, source);
    }
    Ok(())
}

/// Compute the plan for one destination.
pub fn plan_destination(
    fs: &dyn FileSystem,
    source: &Path,
    destination: &Path,
    mode: SyncMode,
) -> Result<SyncPlan> {
    validate_mapping(source, destination)?;
    if !fs.is_dir(source) {
        bail!("sync source {:?} is not a directory", source);
    }

    let listing = list_source(fs, source)?;
    let mut plan = SyncPlan::default();

    if fs.is_dir(destination) && !fs.is_symlink(destination) && mode.deletes() {
        collect_deletions(fs, destination, Path::new(""), &listing, &mut plan.deletions)?;
    } else if fs.exists(destination) && !fs.is_dir(destination) {
        bail!("sync destination {:?} exists and is not a directory", destination);
    }

    for rel in &listing.files {
        let src = source.join(rel);
        let dst = destination.join(rel);
        let scheduled_for_delete = plan.deletions.iter().any(|d| dst.starts_with(d));
        let identical = !scheduled_for_delete
            && fs.is_file(&dst)
            && !fs.is_symlink(&dst)
            && files_identical(fs, &src, &dst)?;
        if identical {
            plan.unchanged += 1;
        } else {
            plan.copies.push((src, dst));
        }
    }

    debug!(
        source = ?source,
        destination = ?destination,
        copies = plan.copies.len(),
        deletions = plan.deletions.len(),
        unchanged = plan.unchanged,
        "sync plan computed"
    );

    Ok(plan)
}

fn list_source(fs: &dyn FileSystem, source: &Path) -> Result<Listing> {
    let mut listing = Listing::default();
    let mut stack = vec![PathBuf::new()];

    while let Some(rel_dir) = stack.pop() {
        for path in fs.read_dir(&source.join(&rel_dir))? {
            let Some(name) = path.file_name() else {
                continue;
            };
            let rel = rel_dir.join(name);
            if fs.is_dir(&path) {
                if fs.is_symlink(&path) {
                    debug!(path = ?path, "skipping symlinked directory in sync source");
                    continue;
                }
                listing.dirs.insert(rel.clone());
                stack.push(rel);
            } else if fs.is_file(&path) {
                listing.files.insert(rel);
            }
        }
    }

    Ok(listing)
}

/// Walk the destination without following symlinks and record every entry
/// that has no counterpart of the same kind in the source.
fn collect_deletions(
    fs: &dyn FileSystem,
    dest_root: &Path,
    rel_dir: &Path,
    listing: &Listing,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let mut entries = fs.read_dir(&dest_root.join(rel_dir))?;
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name() else {
            continue;
        };
        let rel = rel_dir.join(name);
        let full = dest_root.join(&rel);

        if !is_within(dest_root, &full) || full == dest_root {
            bail!("refusing to delete {:?} outside destination {:?}", full, dest_root);
        }

        if fs.is_symlink(&full) {
            if !listing.files.contains(&rel) {
                out.push(full);
            }
        } else if fs.is_dir(&full) {
            if listing.dirs.contains(&rel) {
                collect_deletions(fs, dest_root, &rel, listing, out)?;
            } else {
                out.push(full);
            }
        } else if !listing.files.contains(&rel) {
            out.push(full);
        }
    }

    Ok(())
}
