// src/lib.rs

pub mod apps;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod libraries;
pub mod logging;
pub mod proxy;
pub mod staleness;
pub mod sync;
pub mod tasks;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::{BuildEnv, Settings};
use crate::engine::{DispatchEvent, Dispatcher, OrchestratorExecutor};
use crate::fs::{FileSystem, RealFileSystem};
use crate::proxy::{ProxyGate, run_proxy};
use crate::tasks::{Catalog, ChainKey, Purpose, Step, TaskContext, build_catalog};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings (config file + environment + CLI)
/// - the task catalog for the selected application
/// - a one-shot chain run, or
/// - watch mode: initial build, file watcher, dispatcher, optional dev
///   proxy and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let env = BuildEnv::from_env();
    let settings = Settings::resolve(&args, &env, fs.as_ref())?;
    let app = settings.application()?;
    let catalog = build_catalog(&settings, app)?;

    if settings.dry_run {
        print_dry_run(&settings, &catalog);
        return Ok(());
    }

    let gate = ProxyGate::new();
    let ctx = TaskContext {
        fs,
        gate: gate.clone(),
        root: settings.root.clone(),
        concurrency: settings.config.orchestrator.concurrency,
        empty_inputs: settings.config.orchestrator.empty_inputs,
    };
    let registry = Arc::new(catalog.registry);
    let target = ChainKey::app(settings.app, settings.only.unwrap_or(Purpose::Build));

    if !settings.flags.watch {
        registry.run_chain(target, &ctx).await?;
        info!(chain = %target, "build finished");
        return Ok(());
    }

    if let Err(err) = registry.run_chain(target, &ctx).await {
        error!(chain = %target, error = %err, "initial build failed; watching anyway");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let proxy = settings
        .proxy
        .clone()
        .map(|cfg| tokio::spawn(run_proxy(cfg, gate.clone(), shutdown_rx)));

    let executor = OrchestratorExecutor::new(Arc::clone(&registry), ctx);
    let dispatcher = Dispatcher::new(
        catalog.bindings,
        settings.config.orchestrator.debounce,
        executor,
        gate,
    );
    let event_tx = dispatcher.sender();
    let _watcher = watch::spawn_watcher(&catalog.watch_paths, event_tx.clone())?;

    // Ctrl-C → graceful shutdown.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl-C received; finishing running chains");
        let _ = event_tx.send(DispatchEvent::ShutdownRequested).await;
    });

    dispatcher.run().await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = proxy {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "dev proxy stopped with an error"),
            Err(err) => warn!(error = %err, "dev proxy task panicked"),
        }
    }

    info!("buildwatch exiting");
    Ok(())
}

/// Print the resolved application, its entries, chains and bindings.
fn print_dry_run(settings: &Settings, catalog: &Catalog) {
    let app = &catalog.app;
    println!("buildwatch dry-run");
    println!("  app = {}", app.name);
    println!("  source path = {}", app.source_path);
    println!("  output = {}", app.out_dir().display());
    println!("  flags = {:?}", settings.flags);
    println!(
        "  config = {} (concurrency {}, debounce {:?})",
        settings.config_path.display(),
        settings.config.orchestrator.concurrency,
        settings.config.orchestrator.debounce
    );
    if let Some(proxy) = &settings.proxy {
        println!("  proxy = {} -> {}", proxy.listen, proxy.upstream);
    }
    println!();

    println!("entries ({}):", app.entries.groups().len());
    for group in app.entries.groups() {
        println!("  - {}: {:?}", group.name, group.modules);
    }
    println!();

    println!("chains:");
    for chain in catalog.registry.chains() {
        let gated = if chain.gated { " (pauses proxy)" } else { "" };
        println!("  - {}{gated}", chain.key);
        for step in &chain.steps {
            match step {
                Step::Task(name) => {
                    let detail = catalog
                        .registry
                        .task(name)
                        .map(|t| t.describe())
                        .unwrap_or_default();
                    println!("      {name}: {detail}");
                }
                Step::Chain(key) => println!("      [{key}]"),
            }
        }
    }
    println!();

    println!("bindings ({}):", catalog.bindings.len());
    for binding in &catalog.bindings {
        let patterns: Vec<_> = binding
            .patterns
            .iter()
            .map(|set| format!("{} {:?}", set.base().display(), set.patterns()))
            .collect();
        println!("  - {} -> {}", binding.name, binding.chain);
        println!("      patterns: {}", patterns.join(", "));
        if binding.gate_proxy {
            println!("      pauses proxy");
        }
        println!("      events: {:?}", binding.events);
    }

    debug!("dry-run complete (no execution)");
}
