// src/staleness.rs

//! Timestamp-based staleness checks.
//!
//! A build output is up to date when it exists and is at least as new as
//! every file its input patterns currently resolve to. Patterns are resolved
//! on every call; source trees change between builds.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::types::EmptyInputPolicy;
use crate::watch::PatternSet;

/// Outcome of one staleness comparison, kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// Output exists and no input is newer.
    UpToDate,
    /// The declared output does not exist.
    MissingOutput,
    /// At least one input is newer than the output.
    NewerInput(PathBuf),
    /// Inputs resolved to nothing and the policy asks for a rebuild.
    NoInputs,
}

impl Staleness {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Staleness::UpToDate)
    }
}

/// Compare the inputs matched by `inputs` against `output`.
///
/// Read errors (other than the output simply not existing) are fatal and
/// reported as [`BuildError::Staleness`].
pub fn check(
    fs: &dyn FileSystem,
    inputs: &[PatternSet],
    output: &Path,
    policy: EmptyInputPolicy,
) -> Result<Staleness> {
    if !fs.exists(output) {
        debug!(output = ?output, "output missing; stale");
        return Ok(Staleness::MissingOutput);
    }

    let output_time = fs.modified(output).map_err(|source| BuildError::Staleness {
        path: output.to_path_buf(),
        source,
    })?;

    let mut resolved = 0usize;
    for set in inputs {
        let files = set.resolve(fs).map_err(|source| BuildError::Staleness {
            path: set.base().to_path_buf(),
            source,
        })?;

        for file in files {
            resolved += 1;
            let input_time = fs.modified(&file).map_err(|source| BuildError::Staleness {
                path: file.clone(),
                source,
            })?;
            if is_newer(input_time, output_time) {
                debug!(input = ?file, output = ?output, "input newer than output; stale");
                return Ok(Staleness::NewerInput(file));
            }
        }
    }

    if resolved == 0 && policy == EmptyInputPolicy::Rebuild {
        debug!(output = ?output, "inputs resolved to no files; rebuilding per policy");
        return Ok(Staleness::NoInputs);
    }

    debug!(output = ?output, inputs = resolved, "output up to date");
    Ok(Staleness::UpToDate)
}

/// Boolean form of [`check`].
pub fn is_up_to_date(
    fs: &dyn FileSystem,
    inputs: &[PatternSet],
    output: &Path,
    policy: EmptyInputPolicy,
) -> Result<bool> {
    Ok(check(fs, inputs, output, policy)?.is_up_to_date())
}

fn is_newer(input: SystemTime, output: SystemTime) -> bool {
    input > output
}
