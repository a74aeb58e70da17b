// tests/staleness.rs

use std::path::Path;
use std::sync::{Arc, Mutex};

use buildwatch::errors::BuildError;
use buildwatch::exec::{CommandTemplate, CommandVars};
use buildwatch::fs::mock::MockFileSystem;
use buildwatch::fs::{FileSystem, RealFileSystem};
use buildwatch::proxy::ProxyGate;
use buildwatch::staleness::{Staleness, check, is_up_to_date};
use buildwatch::tasks::builtin::{CommandTask, UpToDateTask};
use buildwatch::tasks::{Task, TaskContext};
use buildwatch::types::EmptyInputPolicy;
use buildwatch::watch::PatternSet;
use buildwatch_test_utils::builders::{TreeBuilder, at};
use buildwatch_test_utils::fake_executor::RecordingTask;
use buildwatch_test_utils::init_tracing;
use proptest::prelude::*;

fn js(base: &str) -> PatternSet {
    PatternSet::new(base, &["**/*.js"]).unwrap()
}

#[test]
fn missing_output_is_stale() {
    let fs = MockFileSystem::new();
    fs.add_file("src/a.js", "a");

    let state = check(&fs, &[js("src")], Path::new("out/a-bundle.js"), EmptyInputPolicy::UpToDate).unwrap();
    assert_eq!(state, Staleness::MissingOutput);
    assert!(!state.is_up_to_date());
}

#[test]
fn newer_input_is_stale() {
    let fs = MockFileSystem::new();
    fs.add_file("src/a.js", "a");
    fs.add_file("src/b.js", "b");
    fs.add_file("out/a-bundle.js", "bundle");
    fs.set_modified("src/a.js", at(100));
    fs.set_modified("src/b.js", at(300));
    fs.set_modified("out/a-bundle.js", at(200));

    let state = check(&fs, &[js("src")], Path::new("out/a-bundle.js"), EmptyInputPolicy::UpToDate).unwrap();
    match state {
        Staleness::NewerInput(path) => assert!(path.ends_with("b.js")),
        other => panic!("expected NewerInput, got {other:?}"),
    }
}

#[test]
fn output_at_least_as_new_as_every_input_is_up_to_date() {
    let fs = MockFileSystem::new();
    fs.add_file("src/a.js", "a");
    fs.add_file("src/b.js", "b");
    fs.add_file("out/a-bundle.js", "bundle");
    fs.set_modified("src/a.js", at(100));
    fs.set_modified("src/b.js", at(200));
    fs.set_modified("out/a-bundle.js", at(200));

    assert!(is_up_to_date(&fs, &[js("src")], Path::new("out/a-bundle.js"), EmptyInputPolicy::UpToDate).unwrap());
}

#[test]
fn excluded_inputs_do_not_count() {
    let fs = MockFileSystem::new();
    fs.add_file("src/a.js", "a");
    fs.add_file("src/lib/vendor.js", "v");
    fs.add_file("out/a-bundle.js", "bundle");
    fs.set_modified("src/a.js", at(100));
    fs.set_modified("src/lib/vendor.js", at(500));
    fs.set_modified("out/a-bundle.js", at(200));

    let inputs = PatternSet::new("src", &["**/*.js", "!lib/**"]).unwrap();
    assert!(is_up_to_date(&fs, &[inputs], Path::new("out/a-bundle.js"), EmptyInputPolicy::UpToDate).unwrap());
}

#[test]
fn empty_input_set_follows_policy() {
    let fs = MockFileSystem::new();
    fs.add_dir("src");
    fs.add_file("out/a-bundle.js", "bundle");
    let output = Path::new("out/a-bundle.js");

    assert!(is_up_to_date(&fs, &[js("src")], output, EmptyInputPolicy::UpToDate).unwrap());
    assert_eq!(
        check(&fs, &[js("src")], output, EmptyInputPolicy::Rebuild).unwrap(),
        Staleness::NoInputs
    );
}

#[test]
fn read_errors_are_fatal_not_stale() {
    let fs = MockFileSystem::new();
    fs.add_file("src/a.js", "a");
    fs.add_file("out/a-bundle.js", "bundle");
    fs.fail_on("src");

    let err = check(&fs, &[js("src")], Path::new("out/a-bundle.js"), EmptyInputPolicy::UpToDate)
        .unwrap_err();
    assert!(matches!(err, BuildError::Staleness { .. }), "got {err:?}");
}

fn context(fs: Arc<dyn FileSystem>, root: &Path) -> TaskContext {
    TaskContext {
        fs,
        gate: ProxyGate::new(),
        root: root.to_path_buf(),
        concurrency: 2,
        empty_inputs: EmptyInputPolicy::UpToDate,
    }
}

#[cfg(unix)]
#[tokio::test]
async fn stale_bundle_is_rebuilt_and_then_left_alone() {
    init_tracing();
    let tree = TreeBuilder::new();
    tree.file_at("src/a.js", "a", 2_000)
        .file_at("out/a-bundle.js", "old bundle", 1_000);

    let log = Arc::new(Mutex::new(Vec::new()));
    let bundle = CommandTask::new(
        "bundle",
        CommandTemplate::new("echo bundled > {out}").unwrap(),
        CommandVars::new(),
    )
    .with_output(tree.path("out/a-bundle.js"));
    let task = UpToDateTask {
        name: "uptodate-bundle".to_string(),
        inputs: vec![PatternSet::new(tree.path("src"), &["**/*.js"]).unwrap()],
        output: tree.path("out/a-bundle.js"),
        tasks: vec![Arc::new(bundle), Arc::new(RecordingTask::new("bundle", &log))],
    };
    let ctx = context(Arc::new(RealFileSystem), tree.root());

    task.run(&ctx).await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["bundle".to_string()]);
    assert_eq!(tree.read("out/a-bundle.js"), "bundled\n");
    assert!(tree.mtime("out/a-bundle.js") >= tree.mtime("src/a.js"));
    let rebuilt_at = tree.mtime("out/a-bundle.js");

    // The rebuilt output is as new as every input: nothing runs.
    task.run(&ctx).await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
    assert_eq!(tree.mtime("out/a-bundle.js"), rebuilt_at);
}

proptest! {
    /// Up to date exactly when the output exists and no input is newer.
    #[test]
    fn up_to_date_iff_output_exists_and_no_input_is_newer(
        inputs in proptest::collection::vec(0u64..50, 0..6),
        output in proptest::option::of(0u64..50),
    ) {
        let fs = MockFileSystem::new();
        fs.add_dir("src");
        for (i, secs) in inputs.iter().enumerate() {
            let path = format!("src/m{i}.js");
            fs.add_file(&path, "m");
            fs.set_modified(&path, at(*secs));
        }
        if let Some(secs) = output {
            fs.add_file("out/a-bundle.js", "bundle");
            fs.set_modified("out/a-bundle.js", at(secs));
        }

        let expected = match output {
            Some(out) => inputs.iter().all(|secs| *secs <= out),
            None => false,
        };
        let actual = is_up_to_date(&fs, &[js("src")], Path::new("out/a-bundle.js"), EmptyInputPolicy::UpToDate)
            .unwrap();
        prop_assert_eq!(actual, expected);
    }
}
