// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds since the epoch of the first mock write. Each write advances the
/// mock clock by one second so later writes are strictly newer.
const CLOCK_START_SECS: u64 = 1_700_000_000;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File {
        content: Vec<u8>,
        modified: SystemTime,
    },
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    clock: u64,
    failing: Vec<PathBuf>,
}

/// In-memory filesystem with a logical clock for modification times and
/// injectable failures.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

fn parent_of(path: &Path) -> Option<PathBuf> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => {
            if path == Path::new(".") {
                None
            } else {
                Some(PathBuf::from("."))
            }
        }
        Some(parent) => Some(parent.to_path_buf()),
        None => None,
    }
}

impl MockState {
    fn next_time(&mut self) -> SystemTime {
        self.clock += 1;
        UNIX_EPOCH + Duration::from_secs(CLOCK_START_SECS + self.clock)
    }

    fn check(&self, path: &Path) -> Result<()> {
        if self.failing.iter().any(|f| path.starts_with(f)) {
            return Err(anyhow!("injected failure for {:?}", path));
        }
        Ok(())
    }

    fn ensure_dir(&mut self, path: &Path) {
        if self.entries.contains_key(path) {
            return;
        }
        self.entries
            .insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if let Some(parent) = parent_of(path) {
            if parent != path {
                self.ensure_dir(&parent);
                self.link_child(&parent, path);
            }
        }
    }

    fn link_child(&mut self, parent: &Path, child: &Path) {
        if let Some(MockEntry::Dir(children)) = self.entries.get_mut(parent) {
            if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
                if !children.iter().any(|c| c == name) {
                    children.push(name.to_string());
                }
            }
        }
    }

    fn unlink_child(&mut self, child: &Path) {
        let Some(parent) = parent_of(child) else {
            return;
        };
        if let Some(MockEntry::Dir(children)) = self.entries.get_mut(&parent) {
            if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
                children.retain(|c| c != name);
            }
        }
    }

    fn put_file(&mut self, path: &Path, content: Vec<u8>, modified: SystemTime) {
        if let Some(parent) = parent_of(path) {
            self.ensure_dir(&parent);
            self.link_child(&parent, path);
        }
        self.entries
            .insert(path.to_path_buf(), MockEntry::File { content, modified });
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.state().ensure_dir(Path::new("."));
        fs
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add (or overwrite) a file, stamping it with the next clock tick.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        let mut state = self.state();
        let modified = state.next_time();
        state.put_file(&path, content.into(), modified);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        self.state().ensure_dir(&path);
    }

    /// Pin the modification time of an existing file.
    pub fn set_modified(&self, path: impl AsRef<Path>, time: SystemTime) {
        let path = normalize(path.as_ref());
        if let Some(MockEntry::File { modified, .. }) = self.state().entries.get_mut(&path) {
            *modified = time;
        }
    }

    /// Every fallible operation on `path` or below it fails from now on.
    pub fn fail_on(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        self.state().failing.push(path);
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let path = normalize(path.as_ref());
        match self.state().entries.get(&path) {
            Some(MockEntry::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let path = normalize(path);
        let state = self.state();
        state.check(&path)?;
        match state.entries.get(&path) {
            Some(MockEntry::File { content, .. }) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let path = normalize(path);
        let state = self.state();
        state.check(&path)?;
        match state.entries.get(&path) {
            Some(MockEntry::File { content, .. }) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let path = normalize(path);
        let mut state = self.state();
        state.check(&path)?;
        let modified = state.next_time();
        state.put_file(&path, contents.to_vec(), modified);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.state().entries.contains_key(&normalize(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(
            self.state().entries.get(&normalize(path)),
            Some(MockEntry::File { .. })
        )
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(
            self.state().entries.get(&normalize(path)),
            Some(MockEntry::Dir(_))
        )
    }

    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        Ok(normalize(path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let key = normalize(path);
        let state = self.state();
        state.check(&key)?;
        match state.entries.get(&key) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        let path = normalize(path);
        let state = self.state();
        state.check(&path)?;
        match state.entries.get(&path) {
            Some(MockEntry::File { modified, .. }) => Ok(*modified),
            Some(MockEntry::Dir(_)) => Ok(UNIX_EPOCH + Duration::from_secs(CLOCK_START_SECS)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn len(&self, path: &Path) -> Result<u64> {
        let path = normalize(path);
        let state = self.state();
        state.check(&path)?;
        match state.entries.get(&path) {
            Some(MockEntry::File { content, .. }) => Ok(content.len() as u64),
            Some(MockEntry::Dir(_)) => Ok(0),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        let from = normalize(from);
        let to = normalize(to);
        let mut state = self.state();
        state.check(&from)?;
        state.check(&to)?;
        let content = match state.entries.get(&from) {
            Some(MockEntry::File { content, .. }) => content.clone(),
            _ => return Err(anyhow!("File not found: {:?}", from)),
        };
        let modified = state.next_time();
        state.put_file(&to, content, modified);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut state = self.state();
        state.check(&path)?;
        if let Some(MockEntry::File { .. }) = state.entries.get(&path) {
            return Err(anyhow!("File exists: {:?}", path));
        }
        state.ensure_dir(&path);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut state = self.state();
        state.check(&path)?;
        match state.entries.get(&path) {
            Some(MockEntry::File { .. }) => {
                state.entries.remove(&path);
                state.unlink_child(&path);
                Ok(())
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut state = self.state();
        state.check(&path)?;
        if !matches!(state.entries.get(&path), Some(MockEntry::Dir(_))) {
            return Err(anyhow!("Not a directory or not found: {:?}", path));
        }
        state.entries.retain(|p, _| !p.starts_with(&path));
        state.unlink_child(&path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = normalize(from);
        let to = normalize(to);
        let mut state = self.state();
        state.check(&from)?;
        state.check(&to)?;
        if let Some(parent) = parent_of(&to) {
            if !matches!(state.entries.get(&parent), Some(MockEntry::Dir(_))) {
                return Err(anyhow!("No such directory: {:?}", parent));
            }
        }
        match state.entries.remove(&from) {
            Some(MockEntry::File { content, modified }) => {
                state.unlink_child(&from);
                state.put_file(&to, content, modified);
                Ok(())
            }
            Some(dir) => {
                state.entries.insert(from.clone(), dir);
                Err(anyhow!("renaming directories is not supported: {:?}", from))
            }
            None => Err(anyhow!("File not found: {:?}", from)),
        }
    }
}
