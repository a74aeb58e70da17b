use std::str::FromStr;

use serde::Deserialize;

/// What the staleness oracle reports when the input patterns resolve to no
/// files at all.
///
/// - `UpToDate`: nothing could have changed, so an existing output is current
///   (default).
/// - `Rebuild`: treat an empty input set as suspicious and rebuild anyway.
///   Useful to catch pattern typos that would otherwise disable the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyInputPolicy {
    #[default]
    UpToDate,
    Rebuild,
}

impl FromStr for EmptyInputPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up_to_date" | "uptodate" => Ok(EmptyInputPolicy::UpToDate),
            "rebuild" => Ok(EmptyInputPolicy::Rebuild),
            other => Err(format!(
                "invalid empty_inputs policy: {other} (expected \"up_to_date\" or \"rebuild\")"
            )),
        }
    }
}

/// Deletion behaviour of a sync mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Copy new/changed files and delete destination entries absent from the
    /// source.
    #[default]
    Mirror,
    /// Copy new/changed files, never delete.
    Additive,
}

impl SyncMode {
    pub fn from_mirror_flag(mirror: bool) -> Self {
        if mirror {
            SyncMode::Mirror
        } else {
            SyncMode::Additive
        }
    }

    pub fn deletes(self) -> bool {
        matches!(self, SyncMode::Mirror)
    }
}

/// Kind of filesystem change delivered to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// Build mode toggles, supplied by CLI flags and environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeFlags {
    pub minify: bool,
    pub minify_framework_bundle: bool,
    pub analyze: bool,
    pub production_source_maps: bool,
    pub watch: bool,
}
