// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::model::{
    ConfigFile, Orchestrator, ProjectSection, RawConfigFile, Tools, ToolsSection,
};
use crate::errors::{BuildError, Result};
use crate::exec::CommandTemplate;
use crate::exec::tools::{DEFAULT_CHECK_MESSAGES, check_messages_template};
use crate::libraries::{Consumer, Library};
use crate::proxy::ProxyConfig;

/// Upper bound for the watch debounce window.
pub const MAX_DEBOUNCE: Duration = Duration::from_secs(60);

const DEFAULT_HANDLEBARS: &str =
    "npx handlebars --extension hjs --namespace dx.core._templates --output {out} {files}";
const DEFAULT_NGTEMPLATES: &str =
    "node tools/build/ngtemplates.js --module {module}-templates --standalone --out {out} {files}";
const DEFAULT_LESS: &str = "npx lessc --compress --source-map {src} {out}";
const DEFAULT_AUTOPREFIXER: &str = "npx postcss {out} --use autoprefixer --replace --map";
const DEFAULT_SASS: &str = "npx sass --style=compressed --load-path=node_modules {src} {out}";
const DEFAULT_REPLACE_GIT_HASH: &str = "node tools/build/replace-git-hash.js --dest {dest} {files}";
const DEFAULT_BUNDLER: &str = "npx webpack --config tools/build/webpack.descriptor.js --env descriptor={src}";
const DEFAULT_ESLINT: &str = "npx eslint --config tools/eslint/.eslintrc.js --cache --cache-location .eslintcache-{app} {files}";
const DEFAULT_CSSLINT: &str = "npx csslint --format=compact {files}";
const DEFAULT_CSSSTYLE: &str = "perl ../../tools/build/cssstyle {file}";
const DEFAULT_PSEUDOLOCALIZE: &str = "echo {files} | xargs java -cp ../../tools/ant/pseudolocalization/pseudolocalization-0.2.jar:../../tools/ant/pseudolocalization/pseudolocalization-0.2-deps.jar com.google.i18n.pseudolocalization.tool.Pseudolocalizer --variant=psaccent";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let orchestrator = validate_orchestrator(&raw)?;
        let tools = validate_tools(&raw.tools)?;
        let library_rebuilds = validate_library_rebuilds(&raw.libraries)?;
        let consumer_rebuilds = validate_consumer_rebuilds(&raw.consumers)?;
        let proxy = raw.proxy.map(|p| ProxyConfig {
            listen: p.listen,
            upstream: p.upstream,
        });
        if let Some(proxy) = &proxy {
            validate_proxy(proxy)?;
        }

        Ok(ConfigFile::new_unchecked(
            orchestrator,
            tools,
            library_rebuilds,
            consumer_rebuilds,
            proxy,
        ))
    }
}

fn validate_orchestrator(raw: &RawConfigFile) -> Result<Orchestrator> {
    let section = &raw.orchestrator;
    if section.concurrency == 0 {
        return Err(BuildError::ConfigError(
            "[orchestrator].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    let debounce = parse_duration(&section.debounce).map_err(|e| {
        BuildError::ConfigError(format!("[orchestrator].debounce: {e}"))
    })?;
    if debounce > MAX_DEBOUNCE {
        return Err(BuildError::ConfigError(format!(
            "[orchestrator].debounce must be at most {}s (got {:?})",
            MAX_DEBOUNCE.as_secs(),
            debounce
        )));
    }

    Ok(Orchestrator {
        concurrency: section.concurrency,
        debounce,
        empty_inputs: section.empty_inputs,
        root_dir_name: section.root_dir_name.trim().to_string(),
    })
}

fn tool(label: &str, configured: &Option<String>, default: &str) -> Result<CommandTemplate> {
    let raw = configured.as_deref().unwrap_or(default);
    CommandTemplate::new(raw).map_err(|e| prefixed(label, e))
}

fn prefixed(prefix: &str, err: BuildError) -> BuildError {
    match err {
        BuildError::ConfigError(msg) => BuildError::ConfigError(format!("{prefix}: {msg}")),
        other => other,
    }
}

fn validate_tools(section: &ToolsSection) -> Result<Tools> {
    let check_messages_raw = section
        .check_messages
        .as_deref()
        .unwrap_or(DEFAULT_CHECK_MESSAGES);

    Ok(Tools {
        handlebars: tool("[tools].handlebars", &section.handlebars, DEFAULT_HANDLEBARS)?,
        ngtemplates: tool("[tools].ngtemplates", &section.ngtemplates, DEFAULT_NGTEMPLATES)?,
        less: tool("[tools].less", &section.less, DEFAULT_LESS)?,
        autoprefixer: tool("[tools].autoprefixer", &section.autoprefixer, DEFAULT_AUTOPREFIXER)?,
        sass: tool("[tools].sass", &section.sass, DEFAULT_SASS)?,
        replace_git_hash: tool(
            "[tools].replace_git_hash",
            &section.replace_git_hash,
            DEFAULT_REPLACE_GIT_HASH,
        )?,
        bundler: tool("[tools].bundler", &section.bundler, DEFAULT_BUNDLER)?,
        eslint: tool("[tools].eslint", &section.eslint, DEFAULT_ESLINT)?,
        csslint: tool("[tools].csslint", &section.csslint, DEFAULT_CSSLINT)?,
        cssstyle: tool("[tools].cssstyle", &section.cssstyle, DEFAULT_CSSSTYLE)?,
        pseudolocalize: tool(
            "[tools].pseudolocalize",
            &section.pseudolocalize,
            DEFAULT_PSEUDOLOCALIZE,
        )?,
        check_messages: check_messages_template(check_messages_raw)
            .map_err(|e| prefixed("[tools].check_messages", e))?,
    })
}

/// Rebuild command used when `[libraries.<name>]` does not override it.
pub fn default_library_rebuild(library: Library) -> String {
    match library {
        Library::DxGui => "cd {src} && npx ng build dx-gui".to_string(),
        Library::DxDataSystem => "cd npm/dxDataSystem && npm run build".to_string(),
        other => format!("cd ../webapp && npx ng build {}", other.as_str()),
    }
}

/// Rebuild command used when `[consumers.<name>]` does not override it.
pub fn default_consumer_rebuild(consumer: Consumer) -> String {
    format!("cd ../{} && npm run build", consumer.as_str())
}

fn validate_library_rebuilds(
    raw: &BTreeMap<String, ProjectSection>,
) -> Result<BTreeMap<Library, CommandTemplate>> {
    for name in raw.keys() {
        name.parse::<Library>()
            .map_err(|_| BuildError::ConfigError(format!("[libraries.{name}]: unknown library")))?;
    }

    let mut out = BTreeMap::new();
    for library in Library::ALL {
        let configured = raw.get(library.as_str()).and_then(|s| s.rebuild.clone());
        let template = tool(
            &format!("[libraries.{library}].rebuild"),
            &configured,
            &default_library_rebuild(library),
        )?;
        out.insert(library, template);
    }
    Ok(out)
}

fn validate_consumer_rebuilds(
    raw: &BTreeMap<String, ProjectSection>,
) -> Result<BTreeMap<Consumer, CommandTemplate>> {
    for name in raw.keys() {
        let consumer = name.parse::<Consumer>().map_err(|_| {
            BuildError::ConfigError(format!("[consumers.{name}]: unknown consumer project"))
        })?;
        if !consumer.is_rebuildable() {
            return Err(BuildError::ConfigError(format!(
                "[consumers.{name}]: project has no rebuild step"
            )));
        }
    }

    let mut out = BTreeMap::new();
    for consumer in Consumer::ALL.into_iter().filter(|c| c.is_rebuildable()) {
        let configured = raw.get(consumer.as_str()).and_then(|s| s.rebuild.clone());
        let template = tool(
            &format!("[consumers.{consumer}].rebuild"),
            &configured,
            &default_consumer_rebuild(consumer),
        )?;
        out.insert(consumer, template);
    }
    Ok(out)
}

pub(crate) fn validate_proxy(proxy: &ProxyConfig) -> Result<()> {
    if proxy.listen.trim().is_empty() || proxy.upstream.trim().is_empty() {
        return Err(BuildError::ConfigError(
            "[proxy] needs both `listen` and `upstream`".to_string(),
        ));
    }
    if proxy.listen.trim() == proxy.upstream.trim() {
        return Err(BuildError::ConfigError(format!(
            "[proxy].listen and upstream are the same address ({})",
            proxy.listen
        )));
    }
    Ok(())
}

/// Parse a simple duration string like `"1s"`, `"250ms"`, `"1m"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => value
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{s}' is too large")),
        _ => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s or m"
        )),
    }
}
