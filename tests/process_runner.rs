// tests/process_runner.rs

#![cfg(unix)]

use std::path::PathBuf;

use buildwatch::errors::BuildError;
use buildwatch::exec::tools::{
    self, GENERATED_CATALOG, PSEUDO_CATALOG, SOURCE_CATALOG, check_messages_template,
};
use buildwatch::exec::{CommandTemplate, CommandVars, run_batch};
use buildwatch::fs::RealFileSystem;
use buildwatch_test_utils::builders::TreeBuilder;
use buildwatch_test_utils::{init_tracing, with_timeout};

/// Three inputs where the first and last fail `grep -q ok`.
fn three_files(tree: &TreeBuilder) -> Vec<PathBuf> {
    tree.file("in/1.txt", "bad\n")
        .file("in/2.txt", "ok\n")
        .file("in/3.txt", "nope\n");
    vec![tree.path("in/1.txt"), tree.path("in/2.txt"), tree.path("in/3.txt")]
}

#[tokio::test]
async fn batch_failure_names_every_failing_item_in_input_order() {
    init_tracing();
    let tree = TreeBuilder::new();
    let files = three_files(&tree);
    let template = CommandTemplate::new("grep -q ok {file}").unwrap();

    let result = with_timeout(run_batch(
        "grep",
        &files,
        &template,
        &CommandVars::new(),
        2,
        tree.root(),
    ))
    .await;

    assert!(!result.is_success());
    assert_eq!(result.items.len(), 3);
    assert!(result.items[1].success);

    let failure = result.into_result().unwrap_err();
    let failed: Vec<_> = failure.failures.iter().map(|f| f.file.clone()).collect();
    assert_eq!(failed, vec![files[0].clone(), files[2].clone()]);
    assert!(failure.failures.iter().all(|f| f.exit_code == Some(1)));

    let text = failure.to_string();
    assert!(text.contains("1.txt") && text.contains("3.txt"), "{text}");
}

#[tokio::test]
async fn limit_of_one_still_runs_every_item() {
    let tree = TreeBuilder::new();
    let files = three_files(&tree);
    let template = CommandTemplate::new("cat {file}").unwrap();

    let result = with_timeout(run_batch("cat", &files, &template, &CommandVars::new(), 1, tree.root())).await;

    assert!(result.is_success());
    let outputs: Vec<_> = result.items.iter().map(|i| i.output.trim().to_string()).collect();
    assert_eq!(outputs, vec!["bad", "ok", "nope"]);
}

#[tokio::test]
async fn batched_template_spawns_one_process() {
    let tree = TreeBuilder::new();
    let files = three_files(&tree);
    let template = CommandTemplate::new("cat {files}").unwrap();
    assert!(template.is_batched());

    let result = with_timeout(run_batch("cat", &files, &template, &CommandVars::new(), 4, tree.root())).await;

    assert!(result.is_success());
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].output.lines().count(), 3);
}

#[tokio::test]
async fn empty_batch_succeeds_without_spawning() {
    let template = CommandTemplate::new("false {file}").unwrap();
    let result = run_batch("noop", &[], &template, &CommandVars::new(), 4, &PathBuf::from(".")).await;
    assert!(result.is_success());
    assert!(result.items.is_empty());
}

#[tokio::test]
async fn check_messages_fails_on_continuation_lines() {
    init_tracing();
    let tree = TreeBuilder::new();
    tree.file("admin/messages_en_US.properties", "a=one\nb=two\n")
        .file("jetstream/messages_en_US.properties", "a=one \\\n  continued\n");
    let files = vec![
        tree.path("admin/messages_en_US.properties"),
        tree.path("jetstream/messages_en_US.properties"),
    ];
    let template = check_messages_template(tools::DEFAULT_CHECK_MESSAGES).unwrap();

    let err = with_timeout(tools::check_messages(
        &files,
        &template,
        &CommandVars::new(),
        2,
        tree.root(),
    ))
    .await
    .unwrap_err();

    let BuildError::Batch(failure) = err else {
        panic!("expected a batch failure, got {err:?}");
    };
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.failures[0].file, files[1]);
    assert_eq!(failure.failures[0].exit_code, Some(0));
    assert!(failure.failures[0].output.contains("a=one"));
}

#[tokio::test]
async fn check_messages_treats_grep_errors_as_failures() {
    let tree = TreeBuilder::new();
    let missing = vec![tree.path("nowhere/messages_en_US.properties")];
    let template = check_messages_template(tools::DEFAULT_CHECK_MESSAGES).unwrap();

    let result = tools::check_messages(&missing, &template, &CommandVars::new(), 1, tree.root()).await;
    assert!(result.is_err());
}

/// Stand-in generator: writes the generated catalog next to each source.
const FAKE_GENERATOR: &str =
    r#"for f in {files}; do cp "$f" "$(dirname "$f")/messages_en_US_psaccent.properties"; done"#;

#[tokio::test]
async fn pseudolocalize_relocates_generated_catalogs() {
    init_tracing();
    let tree = TreeBuilder::new();
    tree.file(&format!("admin/a/{SOURCE_CATALOG}"), "x=1\n")
        .file(&format!("admin/b/{SOURCE_CATALOG}"), "y=2\n")
        .dir("out/admin/a")
        .dir("out/admin/b");
    let files = vec![
        PathBuf::from(format!("admin/a/{SOURCE_CATALOG}")),
        PathBuf::from(format!("admin/b/{SOURCE_CATALOG}")),
    ];
    let template = CommandTemplate::new(FAKE_GENERATOR).unwrap();

    // Commands run with the tree as cwd, so relative paths line up.
    let abs: Vec<_> = files.iter().map(|f| tree.root().join(f)).collect();
    with_timeout(tools::pseudolocalize(
        &RealFileSystem,
        &abs,
        &template,
        &CommandVars::new(),
        2,
        tree.root(),
        &tree.path("out"),
    ))
    .await
    .unwrap();

    assert_eq!(tree.read(&format!("out/admin/a/{PSEUDO_CATALOG}")), "x=1\n");
    assert_eq!(tree.read(&format!("out/admin/b/{PSEUDO_CATALOG}")), "y=2\n");
    assert!(!tree.exists(&format!("admin/a/{GENERATED_CATALOG}")));
}

#[tokio::test]
async fn relocation_into_a_missing_directory_is_fatal() {
    let tree = TreeBuilder::new();
    tree.file(&format!("login/{SOURCE_CATALOG}"), "x=1\n");
    let files = vec![tree.path(&format!("login/{SOURCE_CATALOG}"))];
    let template = CommandTemplate::new(FAKE_GENERATOR).unwrap();

    let err = with_timeout(tools::pseudolocalize(
        &RealFileSystem,
        &files,
        &template,
        &CommandVars::new(),
        1,
        tree.root(),
        &tree.path("out"),
    ))
    .await
    .unwrap_err();

    assert!(matches!(err, BuildError::Relocate { .. }), "got {err:?}");
}

#[test]
fn unknown_placeholders_are_rejected() {
    let err = CommandTemplate::new("lessc {input} {out}").unwrap_err();
    assert!(matches!(err, BuildError::ConfigError(_)));
    assert!(CommandTemplate::new("   ").is_err());
}

#[test]
fn rendering_quotes_paths() {
    let template = CommandTemplate::new("lessc {src} {out}").unwrap();
    let vars = CommandVars::new()
        .path("src", &PathBuf::from("admin/style/styles.less"))
        .path("out", &PathBuf::from("out/my dir/styles.css"));
    let rendered = template.render(&vars);
    assert!(rendered.starts_with("lessc "));
    assert!(rendered.contains("'out/my dir/styles.css'"), "{rendered}");
}
