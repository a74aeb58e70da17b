// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;
use crate::watch::path_utils::relative_str;

/// Directory names never descended into while resolving patterns.
pub const IGNORED_DIRS: &[&str] = &["node_modules"];

/// A compiled list of include/exclude glob patterns anchored at a base
/// directory.
///
/// Patterns follow the usual build-file convention:
///
/// ```text
/// admin/**/*.{css,less}
/// !admin/**/{lib,testout}/**
/// ```
///
/// A leading `!` marks an exclusion. `*` never crosses a `/`; `**` does.
#[derive(Clone)]
pub struct PatternSet {
    base: PathBuf,
    patterns: Vec<String>,
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternSet")
            .field("base", &self.base)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl PatternSet {
    /// Compile `patterns` relative to `base`.
    pub fn new<S: AsRef<str>>(base: impl Into<PathBuf>, patterns: &[S]) -> Result<Self> {
        let base = base.into();
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        let mut raw = Vec::with_capacity(patterns.len());

        for pat in patterns {
            let pat = pat.as_ref().trim();
            raw.push(pat.to_string());
            match pat.strip_prefix('!') {
                Some(negated) => exclude.push(negated.to_string()),
                None => include.push(pat.to_string()),
            }
        }

        let include_set = build_globset(&include)
            .with_context(|| format!("building include globset under {:?}", base))?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(&exclude)
                    .with_context(|| format!("building exclude globset under {:?}", base))?,
            )
        };

        Ok(Self {
            base,
            patterns: raw,
            include: include_set,
            exclude: exclude_set,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The raw patterns, as written.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if a path relative to the base (forward slashes) is
    /// included and not excluded.
    pub fn matches_rel(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    /// Returns true if `path` lies under the base and matches.
    pub fn matches_path(&self, path: &Path) -> bool {
        match relative_str(&self.base, path) {
            Some(rel) if !rel.is_empty() => self.matches_rel(&rel),
            _ => false,
        }
    }

    /// Resolve the patterns to the concrete list of files currently present,
    /// sorted for deterministic output.
    ///
    /// A missing base directory resolves to no files; read errors inside an
    /// existing tree are returned.
    pub fn resolve(&self, fs: &dyn FileSystem) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !fs.is_dir(&self.base) {
            return Ok(files);
        }

        let mut stack = vec![self.base.clone()];
        while let Some(dir) = stack.pop() {
            for path in fs.read_dir(&dir)? {
                if fs.is_symlink(&path) {
                    continue;
                }
                if fs.is_dir(&path) {
                    let ignored = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| IGNORED_DIRS.contains(&n));
                    if !ignored {
                        stack.push(path);
                    }
                } else if fs.is_file(&path) {
                    if let Ok(rel) = path.strip_prefix(&self.base) {
                        let rel_str = rel.to_string_lossy().replace('\\', "/");
                        if self.matches_rel(&rel_str) {
                            files.push(path);
                        }
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
