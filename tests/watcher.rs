// tests/watcher.rs

use std::path::PathBuf;

use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};

use buildwatch::types::ChangeKind;
use buildwatch::watch::{WatchRoot, classify, rebase, watch_roots};
use buildwatch_test_utils::builders::TreeBuilder;

fn event(kind: EventKind, paths: &[&str]) -> Event {
    paths
        .iter()
        .fold(Event::new(kind), |event, p| event.add_path(PathBuf::from(p)))
}

#[test]
fn plain_events_map_onto_change_kinds() {
    let created = event(EventKind::Create(CreateKind::File), &["/w/a.less"]);
    assert_eq!(classify(&created), vec![(PathBuf::from("/w/a.less"), ChangeKind::Created)]);

    let removed = event(EventKind::Remove(RemoveKind::File), &["/w/a.less", "/w/b.less"]);
    assert_eq!(
        classify(&removed),
        vec![
            (PathBuf::from("/w/a.less"), ChangeKind::Removed),
            (PathBuf::from("/w/b.less"), ChangeKind::Removed),
        ]
    );

    let written = event(
        EventKind::Modify(ModifyKind::Data(DataChange::Content)),
        &["/w/a.less"],
    );
    assert_eq!(classify(&written), vec![(PathBuf::from("/w/a.less"), ChangeKind::Modified)]);
}

#[test]
fn access_events_are_dropped() {
    let read = event(EventKind::Access(AccessKind::Read), &["/w/a.less"]);
    assert!(classify(&read).is_empty());
    assert!(classify(&event(EventKind::Other, &["/w/a.less"])).is_empty());
}

#[test]
fn renames_split_into_removal_and_creation() {
    let both = event(
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
        &["/w/old.js", "/w/new.js"],
    );
    assert_eq!(
        classify(&both),
        vec![
            (PathBuf::from("/w/old.js"), ChangeKind::Removed),
            (PathBuf::from("/w/new.js"), ChangeKind::Created),
        ]
    );

    let from = event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/w/old.js"]);
    assert_eq!(classify(&from), vec![(PathBuf::from("/w/old.js"), ChangeKind::Removed)]);

    let to = event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/w/new.js"]);
    assert_eq!(classify(&to), vec![(PathBuf::from("/w/new.js"), ChangeKind::Created)]);
}

#[test]
fn ambiguous_renames_look_at_the_disk() {
    let tree = TreeBuilder::new();
    tree.file("kept.js", "x");
    let kept = tree.path("kept.js");
    let gone = tree.path("gone.js");

    let rename = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)))
        .add_path(kept.clone())
        .add_path(gone.clone());
    assert_eq!(
        classify(&rename),
        vec![(kept, ChangeKind::Created), (gone, ChangeKind::Removed)]
    );
}

fn root(configured: &str, canonical: &str) -> WatchRoot {
    WatchRoot {
        configured: PathBuf::from(configured),
        canonical: PathBuf::from(canonical),
    }
}

#[test]
fn reported_paths_are_rebased_onto_the_deepest_configured_root() {
    let roots = vec![
        root("/repo/client", "/private/repo/client"),
        root("/repo/client/../setup/src", "/private/repo/setup/src"),
        root("/repo/client/jetstream", "/private/repo/client/jetstream"),
    ];

    assert_eq!(
        rebase(&roots, &PathBuf::from("/private/repo/client/jetstream/js/main.js")),
        Some(PathBuf::from("/repo/client/jetstream/js/main.js"))
    );
    assert_eq!(
        rebase(&roots, &PathBuf::from("/private/repo/setup/src/app.js")),
        Some(PathBuf::from("/repo/setup/src/app.js"))
    );
    assert_eq!(rebase(&roots, &PathBuf::from("/elsewhere/a.js")), None);
}

#[test]
fn nested_and_missing_bases_are_not_watched_separately() {
    let tree = TreeBuilder::new();
    tree.dir("client/jetstream/js").dir("setup/src");

    let roots = watch_roots(&[
        tree.path("client/jetstream"),
        tree.path("client"),
        tree.path("missing"),
        tree.path("setup/src"),
    ]);
    let configured: Vec<_> = roots.iter().map(|r| r.configured.clone()).collect();
    assert_eq!(configured, vec![tree.path("client"), tree.path("setup/src")]);
}
