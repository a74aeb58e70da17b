// src/tasks/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::apps::AppName;
use crate::errors::{BuildError, Result};
use crate::libraries::{Consumer, Library};

use super::{Task, TaskContext, TaskFuture};

/// What a chain operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    App(AppName),
    Library(Library),
    Consumer(Consumer),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::App(app) => write!(f, "{app}"),
            Target::Library(lib) => write!(f, "{lib}"),
            Target::Consumer(consumer) => write!(f, "{consumer}"),
        }
    }
}

/// What a chain is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Purpose {
    /// Staleness-gated handlebars + angular templates.
    Templates,
    Handlebars,
    AngularTemplates,
    /// Staleness-gated less + autoprefixer.
    Styles,
    CompileStyles,
    /// Staleness-gated sass.
    SassStyles,
    CompileSass,
    IndexPages,
    Copy,
    DeleteSync,
    Checkstyle,
    CheckMessages,
    Pseudolocalize,
    Clean,
    Bundle,
    Build,
    /// Copies and templates of the apps unit tests load.
    PrepareTesting,
    Rebuild,
    Sync,
    /// Rebuild, sync and downstream rebuilds after a library change.
    Update,
}

impl Purpose {
    pub const ALL: [Purpose; 20] = [
        Purpose::Templates,
        Purpose::Handlebars,
        Purpose::AngularTemplates,
        Purpose::Styles,
        Purpose::CompileStyles,
        Purpose::SassStyles,
        Purpose::CompileSass,
        Purpose::IndexPages,
        Purpose::Copy,
        Purpose::DeleteSync,
        Purpose::Checkstyle,
        Purpose::CheckMessages,
        Purpose::Pseudolocalize,
        Purpose::Clean,
        Purpose::Bundle,
        Purpose::Build,
        Purpose::PrepareTesting,
        Purpose::Rebuild,
        Purpose::Sync,
        Purpose::Update,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Templates => "templates",
            Purpose::Handlebars => "handlebars",
            Purpose::AngularTemplates => "ngtemplates",
            Purpose::Styles => "styles",
            Purpose::CompileStyles => "compile-styles",
            Purpose::SassStyles => "sass-styles",
            Purpose::CompileSass => "sass",
            Purpose::IndexPages => "index-pages",
            Purpose::Copy => "copy",
            Purpose::DeleteSync => "delete-sync",
            Purpose::Checkstyle => "checkstyle",
            Purpose::CheckMessages => "check-messages",
            Purpose::Pseudolocalize => "pseudolocalize",
            Purpose::Clean => "clean",
            Purpose::Bundle => "bundle",
            Purpose::Build => "build",
            Purpose::PrepareTesting => "prepare-testing",
            Purpose::Rebuild => "rebuild",
            Purpose::Sync => "sync",
            Purpose::Update => "update",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = BuildError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Purpose::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Purpose::ALL.iter().map(|p| p.as_str()).collect();
                BuildError::ConfigError(format!(
                    "unknown chain '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Address of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainKey {
    pub target: Target,
    pub purpose: Purpose,
}

impl ChainKey {
    pub fn new(target: Target, purpose: Purpose) -> Self {
        Self { target, purpose }
    }

    pub fn app(app: AppName, purpose: Purpose) -> Self {
        Self::new(Target::App(app), purpose)
    }

    pub fn library(library: Library, purpose: Purpose) -> Self {
        Self::new(Target::Library(library), purpose)
    }

    pub fn consumer(consumer: Consumer, purpose: Purpose) -> Self {
        Self::new(Target::Consumer(consumer), purpose)
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target, self.purpose)
    }
}

/// One step of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Task(String),
    Chain(ChainKey),
}

impl Step {
    pub fn task(name: impl Into<String>) -> Self {
        Step::Task(name.into())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Task(name) => f.write_str(name),
            Step::Chain(key) => write!(f, "[{key}]"),
        }
    }
}

/// An ordered, fail-fast sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub key: ChainKey,
    pub steps: Vec<Step>,
    /// Hold the proxy gate paused while this chain runs.
    pub gated: bool,
}

/// Named tasks and the chains built from them.
///
/// A chain runs at most once at a time, whichever binding or parent chain
/// started it. Concurrent requests for the same chain queue on its lock.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Arc<dyn Task>>,
    chains: BTreeMap<ChainKey, Chain>,
    running: BTreeMap<ChainKey, Mutex<()>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Names are unique.
    pub fn register(&mut self, name: impl Into<String>, task: Arc<dyn Task>) -> Result<()> {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(BuildError::ConfigError(format!(
                "task '{name}' is already registered"
            )));
        }
        debug!(task = %name, "registered task");
        self.tasks.insert(name, task);
        Ok(())
    }

    pub fn task(&self, name: &str) -> Option<&Arc<dyn Task>> {
        self.tasks.get(name)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Define a chain. Task steps must already be registered; chain steps are
    /// checked by [`TaskRegistry::validate`].
    pub fn chain(&mut self, key: ChainKey, steps: Vec<Step>) -> Result<&Chain> {
        self.define(key, steps, false)
    }

    /// Define a chain that pauses the proxy while it runs.
    pub fn gated_chain(&mut self, key: ChainKey, steps: Vec<Step>) -> Result<&Chain> {
        self.define(key, steps, true)
    }

    fn define(&mut self, key: ChainKey, steps: Vec<Step>, gated: bool) -> Result<&Chain> {
        if self.chains.contains_key(&key) {
            return Err(BuildError::ConfigError(format!(
                "chain {key} is already defined"
            )));
        }
        for step in &steps {
            if let Step::Task(name) = step {
                if !self.tasks.contains_key(name) {
                    return Err(BuildError::ConfigError(format!(
                        "chain {key} references unknown task '{name}'"
                    )));
                }
            }
        }
        let chain = Chain { key, steps, gated };
        self.running.insert(key, Mutex::new(()));
        Ok(self.chains.entry(key).or_insert(chain))
    }

    pub fn get_chain(&self, key: &ChainKey) -> Option<&Chain> {
        self.chains.get(key)
    }

    pub fn chains(&self) -> impl Iterator<Item = &Chain> {
        self.chains.values()
    }

    /// Check that every nested chain exists and nesting is acyclic.
    pub fn validate(&self) -> Result<()> {
        let mut graph: DiGraphMap<ChainKey, ()> = DiGraphMap::new();

        for (key, chain) in &self.chains {
            graph.add_node(*key);
            for step in &chain.steps {
                if let Step::Chain(inner) = step {
                    if !self.chains.contains_key(inner) {
                        return Err(BuildError::ConfigError(format!(
                            "chain {key} references unknown chain {inner}"
                        )));
                    }
                    graph.add_edge(*key, *inner, ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(BuildError::ConfigError(format!(
                "cycle detected in nested chains involving {}",
                cycle.node_id()
            ))),
        }
    }

    /// Run a chain: steps strictly in order, stopping at the first failure.
    pub fn run_chain<'a>(&'a self, key: ChainKey, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let chain = self
                .chains
                .get(&key)
                .ok_or_else(|| BuildError::ChainNotFound(key.to_string()))?;

            // Nesting is acyclic, so locks are always taken outer before inner.
            let _running = match self.running.get(&key) {
                Some(lock) => match lock.try_lock() {
                    Ok(guard) => Some(guard),
                    Err(_) => {
                        debug!(chain = %key, "chain already running; waiting");
                        Some(lock.lock().await)
                    }
                },
                None => None,
            };

            let _pause = chain.gated.then(|| ctx.gate.hold());
            info!(chain = %key, steps = chain.steps.len(), "running chain");

            for step in &chain.steps {
                match step {
                    Step::Task(name) => {
                        let task = self
                            .tasks
                            .get(name)
                            .ok_or_else(|| BuildError::TaskNotFound(name.clone()))?;
                        debug!(chain = %key, task = %name, "running task");
                        if let Err(err) = task.run(ctx).await {
                            error!(chain = %key, task = %name, error = %err, "task failed; chain stopped");
                            return Err(BuildError::ChainFailed {
                                chain: key.to_string(),
                                task: name.clone(),
                                source: Box::new(err),
                            });
                        }
                    }
                    Step::Chain(inner) => self.run_chain(*inner, ctx).await?,
                }
            }

            info!(chain = %key, "chain finished");
            Ok(())
        })
    }
}
