// tests/registry.rs

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildwatch::apps::AppName;
use buildwatch::errors::BuildError;
use buildwatch::fs::mock::MockFileSystem;
use buildwatch::libraries::{Consumer, Library};
use buildwatch::proxy::ProxyGate;
use buildwatch::tasks::{ChainKey, Purpose, Step, TaskContext, TaskRegistry};
use buildwatch::types::EmptyInputPolicy;
use buildwatch_test_utils::fake_executor::{OverlapTask, RecordingTask};
use buildwatch_test_utils::{init_tracing, with_timeout};

fn ctx(gate: &ProxyGate) -> TaskContext {
    TaskContext {
        fs: Arc::new(MockFileSystem::new()),
        gate: gate.clone(),
        root: PathBuf::from("."),
        concurrency: 1,
        empty_inputs: EmptyInputPolicy::UpToDate,
    }
}

fn key(purpose: Purpose) -> ChainKey {
    ChainKey::app(AppName::Admin, purpose)
}

#[tokio::test]
async fn chain_stops_at_the_first_failing_task() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    registry.register("lint", Arc::new(RecordingTask::new("lint", &log))).unwrap();
    registry
        .register("compile", Arc::new(RecordingTask::new("compile", &log).failing()))
        .unwrap();
    registry.register("bundle", Arc::new(RecordingTask::new("bundle", &log))).unwrap();
    registry
        .chain(
            key(Purpose::Build),
            vec![Step::task("lint"), Step::task("compile"), Step::task("bundle")],
        )
        .unwrap();

    let gate = ProxyGate::new();
    let err = with_timeout(registry.run_chain(key(Purpose::Build), &ctx(&gate)))
        .await
        .unwrap_err();

    assert_eq!(*log.lock().unwrap(), vec!["lint", "compile"]);
    match err {
        BuildError::ChainFailed { chain, task, source } => {
            assert_eq!(chain, "admin/build");
            assert_eq!(task, "compile");
            assert!(source.to_string().contains("boom"));
        }
        other => panic!("expected ChainFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn rerunning_a_successful_chain_runs_every_step_again() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    registry.register("a", Arc::new(RecordingTask::new("a", &log))).unwrap();
    registry.register("b", Arc::new(RecordingTask::new("b", &log))).unwrap();
    registry
        .chain(key(Purpose::Copy), vec![Step::task("a"), Step::task("b")])
        .unwrap();

    let gate = ProxyGate::new();
    registry.run_chain(key(Purpose::Copy), &ctx(&gate)).await.unwrap();
    registry.run_chain(key(Purpose::Copy), &ctx(&gate)).await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "a", "b"]);
}

#[test]
fn duplicate_task_names_are_rejected() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    registry.register("sass", Arc::new(RecordingTask::new("sass", &log))).unwrap();
    let err = registry
        .register("sass", Arc::new(RecordingTask::new("sass", &log)))
        .unwrap_err();
    assert!(matches!(err, BuildError::ConfigError(_)));
}

#[test]
fn chains_must_reference_known_tasks_and_chains() {
    let mut registry = TaskRegistry::new();
    let err = registry
        .chain(key(Purpose::Build), vec![Step::task("missing")])
        .unwrap_err();
    assert!(matches!(err, BuildError::ConfigError(_)));

    registry
        .chain(key(Purpose::Build), vec![Step::Chain(key(Purpose::Styles))])
        .unwrap();
    let err = registry.validate().unwrap_err();
    assert!(err.to_string().contains("admin/styles"), "{err}");
}

#[test]
fn duplicate_chain_keys_are_rejected() {
    let mut registry = TaskRegistry::new();
    registry.chain(key(Purpose::Clean), vec![]).unwrap();
    assert!(registry.chain(key(Purpose::Clean), vec![]).is_err());
}

#[test]
fn nested_chain_cycles_are_rejected() {
    let mut registry = TaskRegistry::new();
    registry
        .chain(key(Purpose::Build), vec![Step::Chain(key(Purpose::Bundle))])
        .unwrap();
    registry
        .chain(key(Purpose::Bundle), vec![Step::Chain(key(Purpose::Build))])
        .unwrap();
    let err = registry.validate().unwrap_err();
    assert!(err.to_string().contains("cycle"), "{err}");
}

#[tokio::test]
async fn gated_chains_pause_the_proxy_including_nested_runs() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let rebuild = RecordingTask::new("rebuild", &log);
    let downstream = RecordingTask::new("downstream", &log);
    let rebuild_seen = Arc::clone(&rebuild.saw_pause);
    let downstream_seen = Arc::clone(&downstream.saw_pause);

    let mut registry = TaskRegistry::new();
    registry.register("rebuild", Arc::new(rebuild)).unwrap();
    registry.register("downstream", Arc::new(downstream)).unwrap();

    let lib_rebuild = ChainKey::library(Library::AdminShared, Purpose::Rebuild);
    let consumer = ChainKey::consumer(Consumer::Setup, Purpose::Rebuild);
    let update = ChainKey::library(Library::AdminShared, Purpose::Update);
    registry.chain(lib_rebuild, vec![Step::task("rebuild")]).unwrap();
    registry.gated_chain(consumer, vec![Step::task("downstream")]).unwrap();
    registry
        .gated_chain(update, vec![Step::Chain(lib_rebuild), Step::Chain(consumer)])
        .unwrap();
    registry.validate().unwrap();

    let gate = ProxyGate::new();
    registry.run_chain(update, &ctx(&gate)).await.unwrap();

    assert_eq!(*rebuild_seen.lock().unwrap(), vec![true]);
    assert_eq!(*downstream_seen.lock().unwrap(), vec![true]);
    assert!(!gate.is_paused());
    assert_eq!(gate.depth(), 0);
}

#[tokio::test]
async fn failing_gated_chain_still_resumes_the_proxy() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    registry
        .register("sass", Arc::new(RecordingTask::new("sass", &log).failing()))
        .unwrap();
    registry
        .gated_chain(key(Purpose::CompileSass), vec![Step::task("sass")])
        .unwrap();

    let gate = ProxyGate::new();
    assert!(registry.run_chain(key(Purpose::CompileSass), &ctx(&gate)).await.is_err());
    assert!(!gate.is_paused());
}

#[test]
fn purposes_parse_from_their_names() {
    for purpose in Purpose::ALL {
        assert_eq!(purpose.as_str().parse::<Purpose>().unwrap(), purpose);
    }
    assert_eq!("check_messages".parse::<Purpose>().unwrap(), Purpose::CheckMessages);
    assert!("deploy".parse::<Purpose>().is_err());
}

#[tokio::test]
async fn a_chain_shared_by_two_parents_never_overlaps_itself() {
    let task = OverlapTask::new(Duration::from_millis(50));
    let consumer = ChainKey::consumer(Consumer::Setup, Purpose::Rebuild);
    let admin_shared = ChainKey::library(Library::AdminShared, Purpose::Update);
    let system_lib = ChainKey::library(Library::SystemLib, Purpose::Update);

    let mut registry = TaskRegistry::new();
    registry.register("rebuild-setup", Arc::new(task.clone())).unwrap();
    registry.chain(consumer, vec![Step::task("rebuild-setup")]).unwrap();
    registry.chain(admin_shared, vec![Step::Chain(consumer)]).unwrap();
    registry.chain(system_lib, vec![Step::Chain(consumer)]).unwrap();
    registry.validate().unwrap();

    let gate = ProxyGate::new();
    let ctx = ctx(&gate);
    let (a, b, c) = with_timeout(async {
        tokio::join!(
            registry.run_chain(admin_shared, &ctx),
            registry.run_chain(system_lib, &ctx),
            registry.run_chain(consumer, &ctx),
        )
    })
    .await;
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(task.finished(), 3);
    assert_eq!(task.peak(), 1);
}
