// src/sync/hash.rs

//! Content hashing used to skip copying unchanged files.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;

use crate::fs::FileSystem;

/// Compute the blake3 hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// True if both files exist with the same length and the same content.
pub fn files_identical(fs: &dyn FileSystem, a: &Path, b: &Path) -> Result<bool> {
    if fs.len(a)? != fs.len(b)? {
        return Ok(false);
    }
    Ok(compute_file_hash(fs, a)? == compute_file_hash(fs, b)?)
}
