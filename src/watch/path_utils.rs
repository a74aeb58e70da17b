// src/watch/path_utils.rs

//! Path helpers shared by the watcher, pattern sets and sync.

use std::path::{Component, Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let root = lexical_normalize(root);
    let path = lexical_normalize(path);

    if root == Path::new(".") && path.is_relative() && !path.starts_with("..") {
        return Some(path.to_string_lossy().replace('\\', "/"));
    }

    if let Ok(rel) = path.strip_prefix(&root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    // macOS reports events under /private/var for /var, and similar.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    None
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` past the start of a relative path is kept, so `../webapp` stays
/// `../webapp`.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    let normalized: PathBuf = out.iter().collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// True if `path` stays inside `root` after lexical normalization.
pub fn is_within(root: &Path, path: &Path) -> bool {
    let root = lexical_normalize(root);
    let path = lexical_normalize(path);
    if root == Path::new(".") {
        return !path.starts_with("..") && !path.is_absolute();
    }
    path.starts_with(&root)
}
