#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use filetime::{FileTime, set_file_mtime};
use tempfile::TempDir;

use buildwatch::config::ConfigFile;
use buildwatch::config::model::{ProjectSection, ProxySection, RawConfigFile};
use buildwatch::types::EmptyInputPolicy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.orchestrator.concurrency = n;
        self
    }

    pub fn debounce(mut self, value: &str) -> Self {
        self.config.orchestrator.debounce = value.to_string();
        self
    }

    pub fn empty_inputs(mut self, policy: EmptyInputPolicy) -> Self {
        self.config.orchestrator.empty_inputs = policy;
        self
    }

    pub fn root_dir_name(mut self, name: &str) -> Self {
        self.config.orchestrator.root_dir_name = name.to_string();
        self
    }

    pub fn library_rebuild(mut self, library: &str, cmd: &str) -> Self {
        self.config.libraries.insert(
            library.to_string(),
            ProjectSection {
                rebuild: Some(cmd.to_string()),
            },
        );
        self
    }

    pub fn consumer_rebuild(mut self, consumer: &str, cmd: &str) -> Self {
        self.config.consumers.insert(
            consumer.to_string(),
            ProjectSection {
                rebuild: Some(cmd.to_string()),
            },
        );
        self
    }

    pub fn proxy(mut self, listen: &str, upstream: &str) -> Self {
        self.config.proxy = Some(ProxySection {
            listen: listen.to_string(),
            upstream: upstream.to_string(),
        });
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A real directory tree under a temp dir, with pinned mtimes.
pub struct TreeBuilder {
    dir: TempDir,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a file (creating parents).
    pub fn file(&self, rel: &str, content: &str) -> &Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write file");
        self
    }

    /// Write a file and pin its mtime to `secs` after the epoch.
    pub fn file_at(&self, rel: &str, content: &str, secs: u64) -> &Self {
        self.file(rel, content);
        self.touch(rel, secs)
    }

    pub fn dir(&self, rel: &str) -> &Self {
        std::fs::create_dir_all(self.path(rel)).expect("create dir");
        self
    }

    /// Pin the mtime of an existing file to `secs` after the epoch.
    pub fn touch(&self, rel: &str, secs: u64) -> &Self {
        set_file_mtime(self.path(rel), FileTime::from_unix_time(secs as i64, 0))
            .expect("set mtime");
        self
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).expect("read file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    pub fn mtime(&self, rel: &str) -> SystemTime {
        std::fs::metadata(self.path(rel))
            .and_then(|m| m.modified())
            .expect("read mtime")
    }

    /// Every file under `rel`, relative to it, with forward slashes, sorted.
    pub fn files_under(&self, rel: &str) -> Vec<String> {
        let base = self.path(rel);
        let mut out = Vec::new();
        collect(&base, &base, &mut out);
        out.sort();
        out
    }

    /// File name → content for every file under `rel`.
    pub fn snapshot(&self, rel: &str) -> BTreeMap<String, String> {
        self.files_under(rel)
            .into_iter()
            .map(|f| {
                let content = self.read(&format!("{rel}/{f}"));
                (f, content)
            })
            .collect()
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn collect(base: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(base, &path, out);
        } else if let Ok(rel) = path.strip_prefix(base) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}

/// `secs` after the epoch, for mock filesystem timestamps.
pub fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}
