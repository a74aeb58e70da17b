// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::CommandTemplate;
use crate::libraries::{Consumer, Library};
use crate::proxy::ProxyConfig;
use crate::types::EmptyInputPolicy;

/// Top-level tool configuration as read from `Buildwatch.toml`.
///
/// ```toml
/// [orchestrator]
/// concurrency = 8
/// debounce = "1s"
/// empty_inputs = "up_to_date"
/// root_dir_name = "client"
///
/// [tools]
/// cssstyle = "perl ../../tools/build/cssstyle {file}"
///
/// [libraries.assets]
/// rebuild = "cd ../webapp && npx ng build assets"
///
/// [proxy]
/// listen = "127.0.0.1:8080"
/// upstream = "127.0.0.1:8081"
/// ```
///
/// All sections are optional and have reasonable defaults; a missing file is
/// the same as an empty one.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub orchestrator: OrchestratorSection,

    #[serde(default)]
    pub tools: ToolsSection,

    /// Rebuild overrides keyed by library name (`dx-gui`, `assets`, ...).
    #[serde(default)]
    pub libraries: BTreeMap<String, ProjectSection>,

    /// Rebuild overrides keyed by consumer project (`setup`, `server-setup`).
    #[serde(default)]
    pub consumers: BTreeMap<String, ProjectSection>,

    #[serde(default)]
    pub proxy: Option<ProxySection>,
}

/// `[orchestrator]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    /// Maximum number of tool processes alive at once per batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Quiet window before a watch binding fires (e.g. `"500ms"`, `"1s"`).
    #[serde(default = "default_debounce")]
    pub debounce: String,

    /// What the staleness check does when inputs resolve to nothing.
    #[serde(default)]
    pub empty_inputs: EmptyInputPolicy,

    /// Required name of the directory the orchestrator runs from. Empty
    /// disables the check.
    #[serde(default = "default_root_dir_name")]
    pub root_dir_name: String,
}

fn default_concurrency() -> usize {
    8
}

fn default_debounce() -> String {
    "1s".to_string()
}

fn default_root_dir_name() -> String {
    "client".to_string()
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            debounce: default_debounce(),
            empty_inputs: EmptyInputPolicy::default(),
            root_dir_name: default_root_dir_name(),
        }
    }
}

/// `[tools]` section: command templates for the external tools.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolsSection {
    pub handlebars: Option<String>,
    pub ngtemplates: Option<String>,
    pub less: Option<String>,
    pub autoprefixer: Option<String>,
    pub sass: Option<String>,
    pub replace_git_hash: Option<String>,
    pub bundler: Option<String>,
    pub eslint: Option<String>,
    pub csslint: Option<String>,
    pub cssstyle: Option<String>,
    pub pseudolocalize: Option<String>,
    pub check_messages: Option<String>,
}

/// `[libraries.<name>]` / `[consumers.<name>]`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectSection {
    pub rebuild: Option<String>,
}

/// `[proxy]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxySection {
    pub listen: String,
    pub upstream: String,
}

/// Validated `[orchestrator]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orchestrator {
    pub concurrency: usize,
    pub debounce: Duration,
    pub empty_inputs: EmptyInputPolicy,
    pub root_dir_name: String,
}

/// Validated tool commands, defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub handlebars: CommandTemplate,
    pub ngtemplates: CommandTemplate,
    pub less: CommandTemplate,
    pub autoprefixer: CommandTemplate,
    pub sass: CommandTemplate,
    pub replace_git_hash: CommandTemplate,
    pub bundler: CommandTemplate,
    pub eslint: CommandTemplate,
    pub csslint: CommandTemplate,
    pub cssstyle: CommandTemplate,
    pub pseudolocalize: CommandTemplate,
    pub check_messages: CommandTemplate,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, which fills defaults and
/// checks every command template.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub orchestrator: Orchestrator,
    pub tools: Tools,
    pub library_rebuilds: BTreeMap<Library, CommandTemplate>,
    pub consumer_rebuilds: BTreeMap<Consumer, CommandTemplate>,
    pub proxy: Option<ProxyConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        orchestrator: Orchestrator,
        tools: Tools,
        library_rebuilds: BTreeMap<Library, CommandTemplate>,
        consumer_rebuilds: BTreeMap<Consumer, CommandTemplate>,
        proxy: Option<ProxyConfig>,
    ) -> Self {
        Self {
            orchestrator,
            tools,
            library_rebuilds,
            consumer_rebuilds,
            proxy,
        }
    }

    pub fn library_rebuild(&self, library: Library) -> Option<&CommandTemplate> {
        self.library_rebuilds.get(&library)
    }

    pub fn consumer_rebuild(&self, consumer: Consumer) -> Option<&CommandTemplate> {
        self.consumer_rebuilds.get(&consumer)
    }
}
