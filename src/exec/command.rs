// src/exec/command.rs

//! Command templates and single-process execution.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::BuildError;

/// Placeholders a template may reference.
pub const PLACEHOLDERS: &[&str] = &[
    "file", "files", "app", "module", "src", "dest", "out", "root",
];

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex is valid"));

/// A shell command with `{name}` placeholders.
///
/// A template that mentions `{files}` is *batched*: it runs once with the
/// whole file list instead of once per file.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    raw: String,
    success_codes: Vec<i32>,
}

impl fmt::Debug for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandTemplate({:?})", self.raw)
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl CommandTemplate {
    /// Parse a template, rejecting empty commands and unknown placeholders.
    pub fn new(raw: impl Into<String>) -> std::result::Result<Self, BuildError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(BuildError::ConfigError(
                "command template must not be empty".to_string(),
            ));
        }
        for caps in PLACEHOLDER_RE.captures_iter(&raw) {
            let name = &caps[1];
            if !PLACEHOLDERS.contains(&name) {
                return Err(BuildError::ConfigError(format!(
                    "unknown placeholder {{{name}}} in command `{raw}` (known: {})",
                    PLACEHOLDERS.join(", ")
                )));
            }
        }
        Ok(Self {
            raw,
            success_codes: vec![0],
        })
    }

    /// Exit codes that count as success (default `[0]`).
    pub fn with_success_codes(mut self, codes: impl Into<Vec<i32>>) -> Self {
        self.success_codes = codes.into();
        self
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_batched(&self) -> bool {
        PLACEHOLDER_RE
            .captures_iter(&self.raw)
            .any(|caps| &caps[1] == "files")
    }

    pub fn is_success(&self, exit_code: Option<i32>) -> bool {
        exit_code.is_some_and(|code| self.success_codes.contains(&code))
    }

    /// Substitute placeholders. Placeholders without a value render empty.
    pub fn render(&self, vars: &CommandVars) -> String {
        PLACEHOLDER_RE
            .replace_all(&self.raw, |caps: &Captures<'_>| {
                vars.get(&caps[1]).unwrap_or_default().to_string()
            })
            .into_owned()
    }
}

/// Values substituted into a [`CommandTemplate`].
#[derive(Debug, Clone, Default)]
pub struct CommandVars {
    values: BTreeMap<String, String>,
}

impl CommandVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw (unquoted) value.
    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Set a single path, shell-quoted.
    pub fn path(self, key: &str, path: &Path) -> Self {
        let quoted = shell_quote(&path.to_string_lossy());
        self.set(key, quoted)
    }

    /// Set a space-separated list of shell-quoted paths.
    pub fn paths(self, key: &str, paths: &[PathBuf]) -> Self {
        let joined = paths
            .iter()
            .map(|p| shell_quote(&p.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ");
        self.set(key, joined)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Quote a string for POSIX `sh`.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./@:+=".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Captured result of one finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.trim_end().to_string();
        let stderr = self.stderr.trim_end();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr);
        }
        text
    }
}

/// Run a rendered shell command in `cwd`, capturing stdout and stderr.
///
/// `label` is only used for logging (usually the task name).
pub async fn run_shell(label: &str, command: &str, cwd: &Path) -> Result<CommandOutput> {
    debug!(task = %label, cmd = %command, cwd = ?cwd, "starting process");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .with_context(|| format!("spawning process for '{label}': {command}"))?;

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for process of '{label}'"))?;

    let result = CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    for line in result.stdout.lines() {
        info!(task = %label, "{}", line);
    }
    for line in result.stderr.lines() {
        debug!(task = %label, "stderr: {}", line);
    }
    debug!(task = %label, exit_code = ?result.exit_code, "process exited");

    Ok(result)
}
