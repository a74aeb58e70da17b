// src/tasks/catalog.rs

//! Registry, chains and watch bindings for one resolved application.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::apps::{AppName, Application, BundleDescriptor};
use crate::config::{Settings, Tools};
use crate::engine::{Binding, EventFilter};
use crate::errors::{BuildError, Result};
use crate::exec::{CommandTemplate, CommandVars};
use crate::libraries::{Consumer, Library};
use crate::sync::SyncSpec;
use crate::types::SyncMode;
use crate::watch::PatternSet;

use super::builtin::{
    BatchToolTask, BundleTask, CleanTask, CommandTask, CopyMapping, CopyTask, DeleteSyncTask,
    RelocatingBatchTask, SyncTask, ToolKind, UpToDateTask,
};
use super::{ChainKey, Purpose, Step, Task, TaskRegistry};

/// Patterns watched in consumer projects that have their own rebuild.
const CONSUMER_WATCH_PATTERNS: &[&str] = &["**/*.{ts,html,scss}"];

/// Vendor asset trees copied into the output alongside the app's own
/// assets: (source dir under the client root, patterns, dest under `out/`).
/// `{app}` in the destination is replaced by the app's output module.
const VENDOR_COPIES: &[(&str, &str, &str)] = &[
    ("node_modules/@dlpx/dxDataSystem/lib", "**/*.{js,css}", "dxcore/lib"),
    (
        "node_modules/@dlpx/assets/themes/delphix/dx-icon/icons",
        "**/*",
        "dxcore/dx-cor-gui/shared/dx-icon/icons",
    ),
    (
        "node_modules/@dlpx/assets/themes/delphix/product",
        "**/*",
        "admin/product",
    ),
    (
        "node_modules/@dlpx/assets/themes/delphix/style/font",
        "**/*.ttf",
        "dxcore/style/font",
    ),
    ("node_modules/@delphix/dx-gui/src/assets", "**/*.svg", "{app}/assets"),
];

/// Everything an invocation can run, built once from [`Settings`].
#[derive(Debug)]
pub struct Catalog {
    pub app: Application,
    pub registry: TaskRegistry,
    /// Watch bindings in a fixed order.
    pub bindings: Vec<Binding>,
    /// Directories the watcher observes.
    pub watch_paths: Vec<PathBuf>,
}

pub fn build_catalog(settings: &Settings, app: Application) -> Result<Catalog> {
    let mut builder = Builder {
        settings,
        app,
        registry: TaskRegistry::new(),
        bindings: Vec::new(),
        watch_paths: Vec::new(),
    };

    builder.app_tasks()?;
    builder.app_chains()?;
    builder.prepare_testing()?;
    builder.app_bindings();
    builder.consumers()?;
    builder.libraries()?;

    builder.registry.validate()?;
    debug!(
        tasks = builder.registry.task_names().count(),
        chains = builder.registry.chains().count(),
        bindings = builder.bindings.len(),
        "catalog built"
    );

    let mut watch_paths = builder.watch_paths;
    watch_paths.dedup();
    Ok(Catalog {
        app: builder.app,
        registry: builder.registry,
        bindings: builder.bindings,
        watch_paths,
    })
}

struct Builder<'a> {
    settings: &'a Settings,
    app: Application,
    registry: TaskRegistry,
    bindings: Vec<Binding>,
    watch_paths: Vec<PathBuf>,
}

impl Builder<'_> {
    fn root(&self) -> &Path {
        &self.settings.root
    }

    fn name(&self, task: &str) -> String {
        format!("{task}:{}", self.app.name)
    }

    fn vars(&self) -> CommandVars {
        CommandVars::new()
            .set("app", self.app.name.as_str())
            .set("module", self.app.module.as_str())
            .path("root", self.root())
    }

    fn add(&mut self, name: &str, task: impl Task + 'static) -> Result<Arc<dyn Task>> {
        let task: Arc<dyn Task> = Arc::new(task);
        self.registry.register(name, Arc::clone(&task))?;
        Ok(task)
    }

    fn key(&self, purpose: Purpose) -> ChainKey {
        ChainKey::app(self.app.name, purpose)
    }

    fn app_tasks(&mut self) -> Result<()> {
        let tools = self.settings.config.tools.clone();
        let assets = self.app.assets.clone();

        self.template_tasks(&tools)?;
        let less = self.add(
            &self.name("less"),
            CommandTask::new(
                self.name("less"),
                tools.less,
                self.vars().path("src", &self.app.styles_entry()),
            )
            .with_output(self.app.styles_output()),
        )?;
        let autoprefixer = self.add(
            &self.name("autoprefixer"),
            CommandTask::new(self.name("autoprefixer"), tools.autoprefixer, self.vars())
                .with_output(self.app.styles_output()),
        )?;
        let sass = self.add(
            &self.name("sass"),
            sass_task(&self.app, &self.name("sass"), tools.sass.clone(), self.vars()),
        )?;

        self.uptodate(
            "uptodate-styles",
            vec![assets.styles.clone()],
            self.app.styles_output(),
            vec![less, autoprefixer],
        )?;
        self.uptodate(
            "uptodate-sass-styles",
            vec![assets.sass_styles.clone()],
            self.app.sass_styles_output(),
            vec![sass],
        )?;

        self.add(
            &self.name("replace-git-hash"),
            CommandTask::new(
                self.name("replace-git-hash"),
                tools.replace_git_hash,
                self.vars().path("dest", &self.app.out_root()),
            )
            .with_inputs(assets.index_pages.clone()),
        )?;

        self.copy_task()?;

        self.add(
            &self.name("delete-sync"),
            DeleteSyncTask {
                name: self.name("delete-sync"),
                outputs: assets.compiled_outputs.clone(),
                source_dir: self.app.source_dir(),
            },
        )?;

        let batch_tools = [
            ("eslint", ToolKind::Plain, assets.lint.clone(), tools.eslint),
            ("csslint", ToolKind::Plain, assets.css.clone(), tools.csslint),
            ("cssstyle", ToolKind::StyleLint, assets.css.clone(), tools.cssstyle),
            (
                "check-messages",
                ToolKind::CheckMessages,
                assets.check_catalogs.clone(),
                tools.check_messages,
            ),
        ];
        for (tool, kind, patterns, template) in batch_tools {
            let name = self.name(tool);
            self.add(
                &name,
                BatchToolTask {
                    name: name.clone(),
                    kind,
                    patterns,
                    template,
                    vars: self.vars(),
                },
            )?;
        }

        self.add(
            &self.name("pseudolocalize"),
            RelocatingBatchTask {
                name: self.name("pseudolocalize"),
                patterns: assets.message_catalogs.clone(),
                template: tools.pseudolocalize,
                vars: self.vars(),
                out_dir: self.app.out_root(),
            },
        )?;

        self.add(
            &self.name("clean"),
            CleanTask {
                name: self.name("clean"),
                paths: vec![self.app.out_dir(), self.app.testout_dir()],
            },
        )?;

        if let Some(descriptor) = BundleDescriptor::for_app(&self.app, &self.settings.flags) {
            self.add(
                &self.name("bundle"),
                BundleTask {
                    name: self.name("bundle"),
                    descriptor,
                    descriptor_path: self.app.bundle_descriptor_path(),
                    template: tools.bundler,
                    vars: self.vars(),
                },
            )?;
        }
        Ok(())
    }

    /// Handlebars and angular templates, plain and staleness-gated.
    fn template_tasks(&mut self, tools: &Tools) -> Result<()> {
        let assets = self.app.assets.clone();
        let handlebars = self.add(
            &self.name("handlebars"),
            CommandTask::new(self.name("handlebars"), tools.handlebars.clone(), self.vars())
                .with_inputs(assets.templates.clone())
                .with_output(self.app.templates_output()),
        )?;
        let ngtemplates = self.add(
            &self.name("ngtemplates"),
            CommandTask::new(self.name("ngtemplates"), tools.ngtemplates.clone(), self.vars())
                .with_inputs(assets.angular_templates.clone())
                .with_output(self.app.angular_templates_output()),
        )?;

        self.uptodate(
            "uptodate-handlebars",
            vec![assets.templates.clone()],
            self.app.templates_output(),
            vec![handlebars],
        )?;
        self.uptodate(
            "uptodate-ngtemplates",
            vec![assets.angular_templates],
            self.app.angular_templates_output(),
            vec![ngtemplates],
        )
    }

    fn copy_task(&mut self) -> Result<()> {
        let copy = CopyTask {
            name: self.name("copy"),
            mappings: self.copy_mappings()?,
        };
        self.add(&self.name("copy"), copy)?;
        Ok(())
    }

    fn uptodate(
        &mut self,
        task: &str,
        inputs: Vec<PatternSet>,
        output: PathBuf,
        tasks: Vec<Arc<dyn Task>>,
    ) -> Result<()> {
        let name = self.name(task);
        self.add(
            &name,
            UpToDateTask {
                name: name.clone(),
                inputs,
                output,
                tasks,
            },
        )?;
        Ok(())
    }

    fn copy_mappings(&self) -> Result<Vec<CopyMapping>> {
        let out_root = self.app.out_root();
        let mut mappings = vec![CopyMapping {
            patterns: self.app.assets.copy.clone(),
            dest: out_root.clone(),
        }];
        for (source, pattern, dest) in VENDOR_COPIES {
            let dest = dest.replace("{app}", &self.app.module);
            mappings.push(CopyMapping {
                patterns: PatternSet::new(self.root().join(source), &[*pattern])?,
                dest: out_root.join(dest),
            });
        }
        Ok(mappings)
    }

    fn app_chains(&mut self) -> Result<()> {
        let app = self.app.name;
        let task = |t: &str| Step::task(format!("{t}:{app}"));
        let nested = |p: Purpose| Step::Chain(ChainKey::app(app, p));

        self.support_chains()?;
        let chains = [
            (Purpose::Handlebars, vec![task("handlebars")]),
            (Purpose::AngularTemplates, vec![task("ngtemplates")]),
            (Purpose::Styles, vec![task("uptodate-styles")]),
            (Purpose::CompileStyles, vec![task("less"), task("autoprefixer")]),
            (Purpose::SassStyles, vec![task("uptodate-sass-styles")]),
            (Purpose::CompileSass, vec![task("sass")]),
            (Purpose::IndexPages, vec![task("replace-git-hash")]),
            (Purpose::DeleteSync, vec![task("delete-sync")]),
            (
                Purpose::Checkstyle,
                vec![task("eslint"), task("csslint"), task("cssstyle")],
            ),
            (Purpose::CheckMessages, vec![task("check-messages")]),
            (Purpose::Pseudolocalize, vec![task("pseudolocalize")]),
            (Purpose::Clean, vec![task("clean")]),
            (
                Purpose::Bundle,
                if self.registry.task(&self.name("bundle")).is_some() {
                    vec![task("bundle")]
                } else {
                    Vec::new()
                },
            ),
            (
                Purpose::Build,
                vec![
                    nested(Purpose::Copy),
                    nested(Purpose::Templates),
                    nested(Purpose::Styles),
                    nested(Purpose::SassStyles),
                    nested(Purpose::IndexPages),
                    nested(Purpose::Bundle),
                ],
            ),
        ];

        for (purpose, steps) in chains {
            self.registry.chain(self.key(purpose), steps)?;
        }
        Ok(())
    }

    /// The `Templates` and `Copy` chains, the part of an app unit tests
    /// depend on.
    fn support_chains(&mut self) -> Result<()> {
        let app = self.app.name;
        let task = |t: &str| Step::task(format!("{t}:{app}"));
        self.registry.chain(
            self.key(Purpose::Templates),
            vec![task("uptodate-handlebars"), task("uptodate-ngtemplates")],
        )?;
        self.registry.chain(self.key(Purpose::Copy), vec![task("copy")])?;
        Ok(())
    }

    /// Unit tests load dxcore and dxtest next to the app, so their copies
    /// and templates must be current too.
    fn prepare_testing(&mut self) -> Result<()> {
        let tools = self.settings.config.tools.clone();
        let mut steps = Vec::new();
        for support in [AppName::Dxcore, AppName::Dxtest] {
            if support != self.app.name {
                let other = Application::resolve(support, None, self.root(), None)?;
                let current = std::mem::replace(&mut self.app, other);
                let registered = self.support_app(&tools);
                self.app = current;
                registered?;
            }
            steps.push(Step::Chain(ChainKey::app(support, Purpose::Copy)));
            steps.push(Step::Chain(ChainKey::app(support, Purpose::Templates)));
        }
        self.registry.chain(self.key(Purpose::PrepareTesting), steps)?;
        Ok(())
    }

    fn support_app(&mut self, tools: &Tools) -> Result<()> {
        self.template_tasks(tools)?;
        self.copy_task()?;
        self.support_chains()
    }

    fn app_bindings(&mut self) {
        let app = self.app.name;
        let assets = self.app.assets.clone();
        let bind = |name: &str, set: &PatternSet, purpose: Purpose| {
            Binding::new(format!("{name}_{app}"), vec![set.clone()], ChainKey::app(app, purpose))
        };

        self.bindings.extend([
            bind("ngtemplates", &assets.angular_templates, Purpose::AngularTemplates).gated(),
            bind("sass_styles", &assets.sass_styles, Purpose::CompileSass).gated(),
            bind("styles", &assets.styles, Purpose::CompileStyles).gated(),
            bind("handlebars", &assets.templates, Purpose::Handlebars).gated(),
            bind("replace-git-hash", &assets.index_pages, Purpose::IndexPages).gated(),
            bind("copy-locale", &assets.locale_copy, Purpose::Copy),
            bind("copy-images", &assets.image_copy, Purpose::Copy),
            bind("delete_sync", &assets.scripts, Purpose::DeleteSync).on(EventFilter::DeletedOnly),
        ]);
        if self.registry.task(&self.name("bundle")).is_some() {
            self.bindings
                .push(bind("scripts", &assets.scripts, Purpose::Bundle).gated());
        }

        self.watch_paths.push(self.app.source_dir());
        let module_dir = self.root().join(&self.app.module);
        if module_dir != self.app.source_dir() {
            self.watch_paths.push(module_dir);
        }
    }

    fn consumers(&mut self) -> Result<()> {
        for consumer in Consumer::ALL {
            let Some(template) = self.settings.config.consumer_rebuild(consumer).cloned() else {
                continue;
            };
            let name = format!("rebuild-{consumer}");
            let vars = CommandVars::new()
                .path("root", self.root())
                .path("src", &consumer.root(self.root()));
            self.add(&name, CommandTask::new(name.clone(), template, vars))?;
            let key = ChainKey::consumer(consumer, Purpose::Rebuild);
            self.registry.chain(key, vec![Step::task(name)])?;

            let src = consumer.root(self.root()).join("src");
            self.bindings.push(
                Binding::new(
                    consumer.as_str(),
                    vec![PatternSet::new(&src, CONSUMER_WATCH_PATTERNS)?],
                    key,
                )
                .gated(),
            );
            self.watch_paths.push(src);
        }
        Ok(())
    }

    fn libraries(&mut self) -> Result<()> {
        let external = self.settings.library_path.clone();
        let admin_sass = self.admin_sass_step()?;

        for library in Library::ALL {
            if !library.is_enabled(external.as_deref()) {
                debug!(library = %library, "library not enabled; skipping");
                continue;
            }
            let (Some(watch_root), Some(dist)) = (
                library.watch_root(self.root(), external.as_deref()),
                library.dist_dir(self.root(), external.as_deref()),
            ) else {
                continue;
            };

            let template = self
                .settings
                .config
                .library_rebuild(library)
                .cloned()
                .ok_or_else(|| {
                    BuildError::ConfigError(format!("no rebuild command for library {library}"))
                })?;
            let src = match (library, external.as_deref()) {
                (Library::DxGui, Some(path)) => path.to_path_buf(),
                _ => watch_root.clone(),
            };
            let vars = CommandVars::new().path("root", self.root()).path("src", &src);

            let rebuild = format!("rebuild-{library}");
            self.add(&rebuild, CommandTask::new(rebuild.clone(), template, vars))?;

            let sync = format!("sync:{library}");
            let spec = SyncSpec {
                name: library.to_string(),
                source: dist,
                destinations: library.destinations(self.root()),
                mode: SyncMode::Mirror,
            };
            self.add(&sync, SyncTask { name: sync.clone(), spec })?;

            self.registry
                .chain(ChainKey::library(library, Purpose::Rebuild), vec![Step::task(rebuild)])?;
            self.registry
                .chain(ChainKey::library(library, Purpose::Sync), vec![Step::task(sync)])?;

            let mut steps = vec![
                Step::Chain(ChainKey::library(library, Purpose::Rebuild)),
                Step::Chain(ChainKey::library(library, Purpose::Sync)),
            ];
            steps.extend(
                library
                    .dependent_rebuilds()
                    .into_iter()
                    .map(|c| Step::Chain(ChainKey::consumer(c, Purpose::Rebuild))),
            );
            if library.recompiles_admin_styles() {
                steps.push(admin_sass.clone());
            }
            let update = ChainKey::library(library, Purpose::Update);
            self.registry.gated_chain(update, steps)?;

            let patterns = PatternSet::new(&watch_root, &library.watch_patterns())?;
            self.bindings
                .push(Binding::new(library.as_str(), vec![patterns], update).gated());
            self.watch_paths.push(watch_root);
        }
        Ok(())
    }

    /// Library updates recompile the admin sass bundle whichever app is
    /// being built.
    fn admin_sass_step(&mut self) -> Result<Step> {
        if self.app.name == AppName::Admin {
            return Ok(Step::Chain(ChainKey::app(AppName::Admin, Purpose::CompileSass)));
        }
        let admin = Application::resolve(AppName::Admin, None, self.root(), None)?;
        let name = "sass:admin".to_string();
        let vars = CommandVars::new()
            .set("app", AppName::Admin.as_str())
            .set("module", admin.module.as_str())
            .path("root", self.root());
        let template = self.settings.config.tools.sass.clone();
        self.add(&name, sass_task(&admin, &name, template, vars))?;
        Ok(Step::task(name))
    }
}

fn sass_task(app: &Application, name: &str, template: CommandTemplate, vars: CommandVars) -> CommandTask {
    CommandTask::new(name, template, vars.path("src", &app.sass_entry()))
        .with_output(app.sass_styles_output())
}
