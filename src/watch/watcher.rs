// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::DispatchEvent;
use crate::types::ChangeKind;
use crate::watch::path_utils::lexical_normalize;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping it stops
/// watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl WatcherHandle {
    /// Directories actually being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

/// A watched directory as configured and as the OS reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    pub configured: PathBuf,
    pub canonical: PathBuf,
}

/// Watch `bases` recursively and forward every change as
/// `DispatchEvent::PathChanged`.
///
/// Missing bases are skipped, and a base nested inside another one is only
/// watched through its parent. Reported paths are rewritten back onto the
/// configured base so they match pattern sets anchored there.
pub fn spawn_watcher(
    bases: &[PathBuf],
    event_tx: mpsc::Sender<DispatchEvent>,
) -> Result<WatcherHandle> {
    let roots = watch_roots(bases);

    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = notify_tx.send(event) {
                    eprintln!("buildwatch: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("buildwatch: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    for root in &roots {
        watcher
            .watch(&root.canonical, RecursiveMode::Recursive)
            .with_context(|| format!("watching {:?}", root.configured))?;
        info!(path = ?root.configured, "watching");
    }

    let async_roots = roots.clone();
    tokio::spawn(async move {
        while let Some(event) = notify_rx.recv().await {
            debug!(?event, "received notify event");
            for (path, kind) in classify(&event) {
                let Some(path) = rebase(&async_roots, &path) else {
                    continue;
                };
                if event_tx
                    .send(DispatchEvent::PathChanged { path, kind })
                    .await
                    .is_err()
                {
                    debug!("dispatcher gone; watcher loop stopping");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        roots: roots.into_iter().map(|r| r.configured).collect(),
    })
}

/// Existing directories among `bases`, minus those nested in another one.
pub fn watch_roots(bases: &[PathBuf]) -> Vec<WatchRoot> {
    let mut candidates: Vec<WatchRoot> = Vec::new();
    for base in bases {
        let Ok(canonical) = base.canonicalize() else {
            warn!(path = ?base, "watch path does not exist; skipping");
            continue;
        };
        if !canonical.is_dir() {
            continue;
        }
        candidates.push(WatchRoot {
            configured: lexical_normalize(base),
            canonical,
        });
    }

    // Shortest first, so parents are kept before their children.
    candidates.sort_by_key(|r| r.canonical.components().count());
    let mut roots: Vec<WatchRoot> = Vec::new();
    for candidate in candidates {
        if roots
            .iter()
            .any(|r| candidate.canonical.starts_with(&r.canonical))
        {
            continue;
        }
        roots.push(candidate);
    }
    roots
}

/// Rewrite an OS-reported path onto the deepest configured base that
/// contains it.
pub fn rebase(roots: &[WatchRoot], path: &Path) -> Option<PathBuf> {
    roots
        .iter()
        .filter_map(|r| {
            path.strip_prefix(&r.canonical)
                .ok()
                .map(|rel| (r.canonical.components().count(), r.configured.join(rel)))
        })
        .max_by_key(|(depth, _)| *depth)
        .map(|(_, p)| lexical_normalize(&p))
}

/// Map a notify event to the change kinds the dispatcher understands.
///
/// Renames count as a removal of the old path and a creation of the new
/// one. Access and unclassified events are dropped.
pub fn classify(event: &Event) -> Vec<(PathBuf, ChangeKind)> {
    let all = |kind: ChangeKind| -> Vec<(PathBuf, ChangeKind)> {
        event.paths.iter().map(|p| (p.clone(), kind)).collect()
    };
    match &event.kind {
        EventKind::Create(_) => all(ChangeKind::Created),
        EventKind::Remove(_) => all(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => all(ChangeKind::Removed),
            RenameMode::To => all(ChangeKind::Created),
            RenameMode::Both => {
                let mut out = Vec::new();
                if let Some(from) = event.paths.first() {
                    out.push((from.clone(), ChangeKind::Removed));
                }
                if let Some(to) = event.paths.get(1) {
                    out.push((to.clone(), ChangeKind::Created));
                }
                out
            }
            _ => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        ChangeKind::Created
                    } else {
                        ChangeKind::Removed
                    };
                    (p.clone(), kind)
                })
                .collect(),
        },
        EventKind::Modify(_) => all(ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
