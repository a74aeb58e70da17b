// src/exec/tools.rs

//! The auxiliary validation/generation tools: style lint, localization
//! variant generation and the messages-format check.
//!
//! Each one is an external process; only exit status and raw output are
//! interpreted here.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{BuildError, Result};
use crate::exec::command::{CommandTemplate, CommandVars};
use crate::exec::runner::{BatchResult, run_batch};
use crate::fs::FileSystem;

/// Source catalog the localization generator reads.
pub const SOURCE_CATALOG: &str = "messages_en_US.properties";
/// File the generator writes next to each source catalog.
pub const GENERATED_CATALOG: &str = "messages_en_US_psaccent.properties";
/// Canonical name of the generated catalog in the output tree.
pub const PSEUDO_CATALOG: &str = "messages_en_PS.properties";

/// Default messages-check command: grep for lines ending in a backslash.
pub const DEFAULT_CHECK_MESSAGES: &str = r"grep -n '\\$' {file}";

/// grep exits 1 when nothing matched, which is the passing case here.
pub fn check_messages_template(raw: &str) -> std::result::Result<CommandTemplate, BuildError> {
    Ok(CommandTemplate::new(raw)?.with_success_codes(vec![1]))
}

/// Run the messages-format check over every catalog.
///
/// A catalog with continuation lines fails with the offending lines as its
/// output; every failing catalog is reported.
pub async fn check_messages(
    files: &[PathBuf],
    template: &CommandTemplate,
    vars: &CommandVars,
    limit: usize,
    cwd: &Path,
) -> Result<BatchResult> {
    let result = run_batch("check-messages", files, template, vars, limit, cwd).await;
    let result = result.into_result()?;
    info!(files = files.len(), "check-messages succeeded");
    Ok(result)
}

/// Run the per-file style lint.
pub async fn style_lint(
    files: &[PathBuf],
    template: &CommandTemplate,
    vars: &CommandVars,
    limit: usize,
    cwd: &Path,
) -> Result<BatchResult> {
    Ok(run_batch("cssstyle", files, template, vars, limit, cwd)
        .await
        .into_result()?)
}

/// Run the localization generator over all source catalogs, then move each
/// generated catalog into the output tree under its canonical name.
///
/// `root` is the directory the catalog paths are relative to; the generated
/// file for `<root>/<rel>/messages_en_US.properties` lands at
/// `<out_dir>/<rel>/messages_en_PS.properties`.
pub async fn pseudolocalize(
    fs: &dyn FileSystem,
    files: &[PathBuf],
    template: &CommandTemplate,
    vars: &CommandVars,
    limit: usize,
    root: &Path,
    out_dir: &Path,
) -> Result<BatchResult> {
    let result = run_batch("pseudolocalize", files, template, vars, limit, root)
        .await
        .into_result()?;

    for file in files {
        let (generated, target) = pseudo_paths(file, root, out_dir);
        relocate(fs, &generated, &target)?;
    }

    info!(files = files.len(), "pseudolocalization finished");
    Ok(result)
}

/// Where the generator writes its output for `catalog`, and where that output
/// belongs in the output tree.
pub fn pseudo_paths(catalog: &Path, root: &Path, out_dir: &Path) -> (PathBuf, PathBuf) {
    let generated = catalog.with_file_name(GENERATED_CATALOG);
    let rel = catalog.strip_prefix(root).unwrap_or(catalog);
    let target = out_dir.join(rel).with_file_name(PSEUDO_CATALOG);
    (generated, target)
}

/// Move a generated file to its canonical output path.
///
/// The target's parent directory must already exist.
pub fn relocate(fs: &dyn FileSystem, from: &Path, to: &Path) -> Result<()> {
    let parent_ok = match to.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs.is_dir(parent),
        _ => true,
    };
    if !parent_ok {
        return Err(BuildError::Relocate {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            reason: "target directory does not exist".to_string(),
        });
    }

    debug!(from = ?from, to = ?to, "relocating generated file");
    fs.rename(from, to).map_err(|e| BuildError::Relocate {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        reason: format!("{e:#}"),
    })
}
