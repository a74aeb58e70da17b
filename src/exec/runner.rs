// src/exec/runner.rs

//! Bounded-parallel batch runner for external tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::{BatchFailure, FailedItem};
use crate::exec::command::{CommandTemplate, CommandVars, run_shell};

/// Result of one process in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// The input file, or the joined list for a batched invocation.
    pub file: PathBuf,
    pub exit_code: Option<i32>,
    pub output: String,
    pub success: bool,
}

/// Aggregated result of [`run_batch`]. Items are in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub command: String,
    pub items: Vec<BatchItem>,
}

impl BatchResult {
    /// SUCCESS only if every spawned process succeeded. An empty batch
    /// succeeds.
    pub fn is_success(&self) -> bool {
        self.items.iter().all(|i| i.success)
    }

    pub fn failures(&self) -> Vec<FailedItem> {
        self.items
            .iter()
            .filter(|i| !i.success)
            .map(|i| FailedItem {
                file: i.file.clone(),
                exit_code: i.exit_code,
                output: i.output.clone(),
            })
            .collect()
    }

    pub fn into_result(self) -> Result<Self, BatchFailure> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(BatchFailure {
                command: self.command.clone(),
                failures: self.failures(),
            })
        }
    }
}

/// Run `template` over `files` with at most `limit` processes alive at once.
///
/// Per-file templates spawn one process per file with `{file}` bound; a
/// batched template (`{files}`) spawns a single process with the whole list.
/// Every failure is collected; nothing is short-circuited.
pub async fn run_batch(
    label: &str,
    files: &[PathBuf],
    template: &CommandTemplate,
    vars: &CommandVars,
    limit: usize,
    cwd: &Path,
) -> BatchResult {
    let command = template.raw().to_string();

    if files.is_empty() {
        debug!(task = %label, "no input files; nothing to run");
        return BatchResult {
            command,
            items: Vec::new(),
        };
    }

    if template.is_batched() {
        let rendered = template.render(&vars.clone().paths("files", files));
        let joined = files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        let item = run_one(label, PathBuf::from(joined), rendered, template, cwd).await;
        log_item(label, &item);
        return BatchResult {
            command,
            items: vec![item],
        };
    }

    let limit = limit.max(1);
    let semaphore = Arc::new(Semaphore::new(limit));
    let mut set = JoinSet::new();

    info!(task = %label, files = files.len(), limit, "running batch");

    for (index, file) in files.iter().enumerate() {
        let rendered = template.render(&vars.clone().path("file", file));
        let semaphore = Arc::clone(&semaphore);
        let template = template.clone();
        let label = label.to_string();
        let file = file.clone();
        let cwd = cwd.to_path_buf();

        set.spawn(async move {
            let item = match semaphore.acquire_owned().await {
                Ok(_permit) => run_one(&label, file, rendered, &template, &cwd).await,
                Err(e) => BatchItem {
                    file,
                    exit_code: None,
                    output: format!("process limiter closed: {e}"),
                    success: false,
                },
            };
            (index, item)
        });
    }

    let mut slots: Vec<Option<BatchItem>> = vec![None; files.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, item)) => {
                log_item(label, &item);
                slots[index] = Some(item);
            }
            Err(e) => warn!(task = %label, error = %e, "batch worker panicked"),
        }
    }

    // A panicked worker leaves its slot empty; it still counts as a failure.
    let items = slots
        .into_iter()
        .zip(files)
        .map(|(slot, file)| {
            slot.unwrap_or_else(|| BatchItem {
                file: file.clone(),
                exit_code: None,
                output: "worker panicked".to_string(),
                success: false,
            })
        })
        .collect();

    BatchResult { command, items }
}

async fn run_one(
    label: &str,
    file: PathBuf,
    rendered: String,
    template: &CommandTemplate,
    cwd: &Path,
) -> BatchItem {
    match run_shell(label, &rendered, cwd).await {
        Ok(out) => BatchItem {
            success: template.is_success(out.exit_code),
            exit_code: out.exit_code,
            output: out.combined(),
            file,
        },
        Err(e) => BatchItem {
            file,
            exit_code: None,
            output: format!("{e:#}"),
            success: false,
        },
    }
}

fn log_item(label: &str, item: &BatchItem) {
    if item.success {
        debug!(task = %label, file = ?item.file, "batch item succeeded");
    } else {
        warn!(
            task = %label,
            file = ?item.file,
            exit_code = ?item.exit_code,
            output = %item.output,
            "batch item failed"
        );
    }
}
