// src/tasks/builtin.rs

//! Built-in task kinds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::apps::BundleDescriptor;
use crate::errors::{BuildError, Result};
use crate::exec::{CommandTemplate, CommandVars, run_batch, run_shell, tools};
use crate::fs::FileSystem;
use crate::staleness;
use crate::sync::{self, SyncSpec};
use crate::watch::PatternSet;
use crate::watch::path_utils::is_within;

use super::{Task, TaskContext, TaskFuture};

/// Render and run one command; a non-success exit fails the task with the
/// captured output.
async fn run_command(
    task: &str,
    template: &CommandTemplate,
    vars: &CommandVars,
    cwd: &Path,
) -> Result<()> {
    let rendered = template.render(vars);
    let output = run_shell(task, &rendered, cwd).await?;
    if template.is_success(output.exit_code) {
        return Ok(());
    }
    let code = output
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string());
    Err(BuildError::task_failed(
        task,
        format!("`{rendered}` exited with {code}\n{}", output.combined()),
    ))
}

fn ensure_parent(fs: &dyn FileSystem, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !fs.is_dir(parent) {
            fs.create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// An opaque external tool with an optional declared output.
///
/// When input patterns are attached, the resolved files are bound to
/// `{files}`; with no matching inputs the tool is not run at all.
#[derive(Debug, Clone)]
pub struct CommandTask {
    pub name: String,
    pub template: CommandTemplate,
    pub vars: CommandVars,
    pub inputs: Option<PatternSet>,
    pub output: Option<PathBuf>,
}

impl CommandTask {
    pub fn new(name: impl Into<String>, template: CommandTemplate, vars: CommandVars) -> Self {
        Self {
            name: name.into(),
            template,
            vars,
            inputs: None,
            output: None,
        }
    }

    pub fn with_inputs(mut self, inputs: PatternSet) -> Self {
        self.inputs = Some(inputs);
        self
    }

    /// Declare an output; it is bound to `{out}` and must exist afterwards.
    pub fn with_output(mut self, output: PathBuf) -> Self {
        self.vars = self.vars.path("out", &output);
        self.output = Some(output);
        self
    }
}

impl Task for CommandTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let mut vars = self.vars.clone();
            if let Some(inputs) = &self.inputs {
                let files = inputs.resolve(ctx.fs.as_ref())?;
                if files.is_empty() {
                    info!(task = %self.name, "no input files; skipping");
                    return Ok(());
                }
                vars = vars.paths("files", &files);
            }
            if let Some(output) = &self.output {
                ensure_parent(ctx.fs.as_ref(), output)?;
            }

            run_command(&self.name, &self.template, &vars, &ctx.root).await?;

            if let Some(output) = &self.output {
                if !ctx.fs.exists(output) {
                    return Err(BuildError::task_failed(
                        &self.name,
                        format!("missing expected output {}", output.display()),
                    ));
                }
            }
            info!(task = %self.name, "done");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        match &self.output {
            Some(out) => format!("run `{}` -> {}", self.template, out.display()),
            None => format!("run `{}`", self.template),
        }
    }
}

/// Runs its inner tasks only when `output` is stale relative to `inputs`.
#[derive(Debug, Clone)]
pub struct UpToDateTask {
    pub name: String,
    pub inputs: Vec<PatternSet>,
    pub output: PathBuf,
    pub tasks: Vec<Arc<dyn Task>>,
}

impl Task for UpToDateTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let state = staleness::check(
                ctx.fs.as_ref(),
                &self.inputs,
                &self.output,
                ctx.empty_inputs,
            )?;
            if state.is_up_to_date() {
                info!(task = %self.name, output = ?self.output, "up to date; skipping");
                return Ok(());
            }

            info!(task = %self.name, reason = ?state, "stale; rebuilding");
            for task in &self.tasks {
                task.run(ctx).await?;
            }
            Ok(())
        })
    }

    fn describe(&self) -> String {
        let inner: Vec<_> = self.tasks.iter().map(|t| t.describe()).collect();
        format!(
            "if {} is stale: {}",
            self.output.display(),
            inner.join("; ")
        )
    }
}

/// Files matched by `patterns` are copied into `dest`, keeping their path
/// relative to the pattern base.
#[derive(Debug, Clone)]
pub struct CopyMapping {
    pub patterns: PatternSet,
    pub dest: PathBuf,
}

/// Newer-only copy: a file is copied when its target is missing or older.
#[derive(Debug, Clone)]
pub struct CopyTask {
    pub name: String,
    pub mappings: Vec<CopyMapping>,
}

impl CopyTask {
    fn copy_mapping(&self, fs: &dyn FileSystem, mapping: &CopyMapping) -> Result<(usize, usize)> {
        let mut copied = 0;
        let mut skipped = 0;
        for file in mapping.patterns.resolve(fs)? {
            let Ok(rel) = file.strip_prefix(mapping.patterns.base()) else {
                continue;
            };
            let target = mapping.dest.join(rel);
            let newer = !fs.exists(&target) || fs.modified(&file)? > fs.modified(&target)?;
            if newer {
                fs.copy_file(&file, &target)?;
                debug!(from = ?file, to = ?target, "copied");
                copied += 1;
            } else {
                skipped += 1;
            }
        }
        Ok((copied, skipped))
    }
}

impl Task for CopyTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let (mut copied, mut skipped) = (0, 0);
            for mapping in &self.mappings {
                let (c, s) = self.copy_mapping(ctx.fs.as_ref(), mapping)?;
                copied += c;
                skipped += s;
            }
            info!(task = %self.name, copied, skipped, "copy finished");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        let parts: Vec<_> = self
            .mappings
            .iter()
            .map(|m| format!("{:?} -> {}", m.patterns.patterns(), m.dest.display()))
            .collect();
        format!("copy newer {}", parts.join(", "))
    }
}

/// Removes compiled outputs whose source file no longer exists.
///
/// `outputs` is anchored at the output dir; an output `a/b.js` is kept while
/// `<source_dir>/a/b.js` exists. Excluded patterns protect generated files
/// with no source counterpart.
#[derive(Debug, Clone)]
pub struct DeleteSyncTask {
    pub name: String,
    pub outputs: PatternSet,
    pub source_dir: PathBuf,
}

impl Task for DeleteSyncTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let fs = ctx.fs.as_ref();
            let base = self.outputs.base();
            let mut removed = 0;
            for file in self.outputs.resolve(fs)? {
                let Ok(rel) = file.strip_prefix(base) else {
                    continue;
                };
                if fs.exists(&self.source_dir.join(rel)) || !is_within(base, &file) {
                    continue;
                }
                fs.remove_file(&file)?;
                debug!(path = ?file, "removed orphaned output");
                removed += 1;
            }
            info!(task = %self.name, removed, "delete-sync finished");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!(
            "remove outputs under {} without a source in {}",
            self.outputs.base().display(),
            self.source_dir.display()
        )
    }
}

/// Runs one sync fan-out.
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub name: String,
    pub spec: SyncSpec,
}

impl Task for SyncTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            sync::run_spec(Arc::clone(&ctx.fs), &self.spec).await?;
            Ok(())
        })
    }

    fn describe(&self) -> String {
        let dests: Vec<_> = self
            .spec
            .destinations
            .iter()
            .map(|d| d.display().to_string())
            .collect();
        format!(
            "sync ({:?}) {} -> {}",
            self.spec.mode,
            self.spec.source.display(),
            dests.join(", ")
        )
    }
}

/// Writes the bundle descriptor, then invokes the bundler with `{src}` bound
/// to the descriptor and `{dest}` to the bundle output dir.
#[derive(Debug, Clone)]
pub struct BundleTask {
    pub name: String,
    pub descriptor: BundleDescriptor,
    pub descriptor_path: PathBuf,
    pub template: CommandTemplate,
    pub vars: CommandVars,
}

impl Task for BundleTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            self.descriptor.write(ctx.fs.as_ref(), &self.descriptor_path)?;
            let vars = self
                .vars
                .clone()
                .path("src", &self.descriptor_path)
                .path("dest", &self.descriptor.output_dir);
            run_command(&self.name, &self.template, &vars, &ctx.root).await?;
            info!(task = %self.name, bundles = self.descriptor.entries.groups().len(), "bundle finished");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        let names: Vec<_> = self.descriptor.entries.names().collect();
        format!(
            "write {} and run `{}` for [{}]",
            self.descriptor_path.display(),
            self.template,
            names.join(", ")
        )
    }
}

/// How a [`BatchToolTask`] interprets its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Plain,
    StyleLint,
    CheckMessages,
}

/// Runs a tool over every file matched by `patterns` through the bounded
/// process runner.
#[derive(Debug, Clone)]
pub struct BatchToolTask {
    pub name: String,
    pub kind: ToolKind,
    pub patterns: PatternSet,
    pub template: CommandTemplate,
    pub vars: CommandVars,
}

impl Task for BatchToolTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let files = self.patterns.resolve(ctx.fs.as_ref())?;
            let limit = ctx.concurrency;
            let root = ctx.root.as_path();
            match self.kind {
                ToolKind::Plain => {
                    run_batch(&self.name, &files, &self.template, &self.vars, limit, root)
                        .await
                        .into_result()?;
                }
                ToolKind::StyleLint => {
                    tools::style_lint(&files, &self.template, &self.vars, limit, root).await?;
                }
                ToolKind::CheckMessages => {
                    tools::check_messages(&files, &self.template, &self.vars, limit, root).await?;
                }
            }
            info!(task = %self.name, files = files.len(), "batch finished");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("`{}` over {:?}", self.template, self.patterns.patterns())
    }
}

/// Batched generator run followed by relocation of each generated file into
/// the output tree.
#[derive(Debug, Clone)]
pub struct RelocatingBatchTask {
    pub name: String,
    pub patterns: PatternSet,
    pub template: CommandTemplate,
    pub vars: CommandVars,
    pub out_dir: PathBuf,
}

impl Task for RelocatingBatchTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let files = self.patterns.resolve(ctx.fs.as_ref())?;
            tools::pseudolocalize(
                ctx.fs.as_ref(),
                &files,
                &self.template,
                &self.vars,
                ctx.concurrency,
                &ctx.root,
                &self.out_dir,
            )
            .await?;
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!(
            "`{}` over {:?}, relocated into {}",
            self.template,
            self.patterns.patterns(),
            self.out_dir.display()
        )
    }
}

/// Removes output directories. Paths outside the client root are refused.
#[derive(Debug, Clone)]
pub struct CleanTask {
    pub name: String,
    pub paths: Vec<PathBuf>,
}

impl Task for CleanTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let fs = ctx.fs.as_ref();
            for path in &self.paths {
                if !is_within(&ctx.root, path) || path == &ctx.root {
                    return Err(BuildError::task_failed(
                        &self.name,
                        format!("refusing to remove {} outside the client root", path.display()),
                    ));
                }
                if fs.is_dir(path) {
                    fs.remove_dir_all(path)?;
                    info!(task = %self.name, path = ?path, "removed");
                } else if fs.exists(path) {
                    fs.remove_file(path)?;
                    info!(task = %self.name, path = ?path, "removed");
                }
            }
            Ok(())
        })
    }

    fn describe(&self) -> String {
        let paths: Vec<_> = self.paths.iter().map(|p| p.display().to_string()).collect();
        format!("remove {}", paths.join(", "))
    }
}
