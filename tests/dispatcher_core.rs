// tests/dispatcher_core.rs

use std::path::PathBuf;
use std::time::Duration;

use proptest::prelude::*;

use buildwatch::apps::AppName;
use buildwatch::engine::{Binding, DispatchCommand, DispatchCore, DispatchEvent, EventFilter};
use buildwatch::tasks::{ChainKey, Purpose};
use buildwatch::types::ChangeKind;
use buildwatch::watch::PatternSet;

const DEBOUNCE: Duration = Duration::from_millis(300);

fn binding(name: &str, base: &str, pattern: &str, purpose: Purpose) -> Binding {
    Binding::new(
        name,
        vec![PatternSet::new(base, &[pattern]).unwrap()],
        ChainKey::app(AppName::Admin, purpose),
    )
}

/// 0: styles on `/w/style/**/*.less`, 1: copy on `/w/src/**/*`.
fn core() -> DispatchCore {
    DispatchCore::new(
        vec![
            binding("styles", "/w/style", "**/*.less", Purpose::CompileStyles),
            binding("copy", "/w/src", "**/*", Purpose::Copy),
        ],
        DEBOUNCE,
    )
}

fn changed(path: &str) -> DispatchEvent {
    DispatchEvent::PathChanged {
        path: PathBuf::from(path),
        kind: ChangeKind::Modified,
    }
}

fn elapsed(binding: usize, generation: u64) -> DispatchEvent {
    DispatchEvent::DebounceElapsed {
        binding,
        generation,
    }
}

fn finished(binding: usize) -> DispatchEvent {
    DispatchEvent::ChainFinished {
        binding,
        success: true,
    }
}

fn start(binding: usize) -> DispatchCommand {
    DispatchCommand::StartChain { binding }
}

#[test]
fn change_schedules_a_debounce_for_matching_bindings_only() {
    let mut core = core();
    let step = core.step(changed("/w/style/main.less"));

    assert!(step.keep_running);
    assert_eq!(
        step.commands,
        vec![DispatchCommand::ScheduleDebounce {
            binding: 0,
            generation: 1,
            after: DEBOUNCE,
        }]
    );
    assert!(core.step(changed("/elsewhere/x.less")).commands.is_empty());
}

#[test]
fn burst_of_changes_runs_the_chain_once() {
    let mut core = core();
    core.step(changed("/w/style/a.less"));
    core.step(changed("/w/style/b.less"));
    core.step(changed("/w/style/c.less"));

    // Timers for superseded generations are ignored.
    assert!(core.step(elapsed(0, 1)).commands.is_empty());
    assert!(core.step(elapsed(0, 2)).commands.is_empty());
    assert_eq!(core.step(elapsed(0, 3)).commands, vec![start(0)]);
    assert!(core.is_running(0));
}

#[test]
fn changes_during_a_run_collapse_into_one_rerun() {
    let mut core = core();
    core.step(changed("/w/style/a.less"));
    core.step(elapsed(0, 1));

    // Two more changes while running: no new debounce, just pending.
    assert!(core.step(changed("/w/style/a.less")).commands.is_empty());
    assert!(core.step(changed("/w/style/b.less")).commands.is_empty());
    assert!(core.is_pending(0));

    assert_eq!(core.step(finished(0)).commands, vec![start(0)]);
    assert!(core.is_running(0));
    assert!(!core.is_pending(0));

    assert!(core.step(finished(0)).commands.is_empty());
    assert!(core.is_idle());
}

#[test]
fn failed_run_returns_to_idle_and_keeps_watching() {
    let mut core = core();
    core.step(changed("/w/src/app.js"));
    core.step(elapsed(1, 1));
    let step = core.step(DispatchEvent::ChainFinished {
        binding: 1,
        success: false,
    });
    assert!(step.commands.is_empty());
    assert!(step.keep_running);
    assert!(core.is_idle());

    assert_eq!(core.step(changed("/w/src/app.js")).commands.len(), 1);
}

#[test]
fn bindings_are_independent() {
    let mut core = core();
    core.step(changed("/w/style/a.less"));
    core.step(elapsed(0, 1));
    core.step(changed("/w/src/index.html"));

    assert!(core.is_running(0));
    assert!(!core.is_running(1));
    assert_eq!(core.step(elapsed(1, 1)).commands, vec![start(1)]);
}

#[test]
fn deleted_only_bindings_ignore_other_change_kinds() {
    let mut core = DispatchCore::new(
        vec![binding("delete", "/w/src", "**/*.js", Purpose::DeleteSync).on(EventFilter::DeletedOnly)],
        DEBOUNCE,
    );

    assert!(core.step(changed("/w/src/a.js")).commands.is_empty());
    let removed = DispatchEvent::PathChanged {
        path: PathBuf::from("/w/src/a.js"),
        kind: ChangeKind::Removed,
    };
    assert_eq!(core.step(removed).commands.len(), 1);
}

#[test]
fn shutdown_waits_for_running_chains() {
    let mut core = core();
    core.step(changed("/w/style/a.less"));
    core.step(elapsed(0, 1));
    core.step(changed("/w/style/a.less"));
    core.step(changed("/w/src/x.js"));

    let step = core.step(DispatchEvent::ShutdownRequested);
    assert!(step.keep_running);
    assert!(!core.is_pending(0));

    // Debouncing binding is dropped; its timer no longer starts anything.
    assert!(core.step(elapsed(1, 1)).commands.is_empty());
    assert!(core.step(changed("/w/src/y.js")).commands.is_empty());

    let step = core.step(finished(0));
    assert!(step.commands.is_empty());
    assert!(!step.keep_running);
}

#[test]
fn shutdown_when_idle_stops_immediately() {
    let mut core = core();
    assert!(!core.step(DispatchEvent::ShutdownRequested).keep_running);
}

#[test]
fn events_for_unknown_bindings_are_ignored() {
    let mut core = core();
    assert!(core.step(elapsed(9, 1)).commands.is_empty());
    assert!(core.step(finished(9)).commands.is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Change,
    FireLatestTimer,
    Finish,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Change), Just(Op::FireLatestTimer), Just(Op::Finish)]
}

proptest! {
    /// At most one run per binding at any time, and every run is matched by
    /// a finish before the next start.
    #[test]
    fn never_more_than_one_run_in_flight(ops in proptest::collection::vec(op(), 1..60)) {
        let mut core = DispatchCore::new(
            vec![binding("styles", "/w/style", "**/*.less", Purpose::CompileStyles)],
            DEBOUNCE,
        );
        let mut latest_generation = None;
        let mut in_flight = 0usize;

        for op in ops {
            let event = match op {
                Op::Change => changed("/w/style/a.less"),
                Op::FireLatestTimer => match latest_generation {
                    Some(generation) => elapsed(0, generation),
                    None => continue,
                },
                Op::Finish if in_flight == 1 => finished(0),
                Op::Finish => continue,
            };
            if matches!(event, DispatchEvent::ChainFinished { .. }) {
                in_flight -= 1;
            }

            for command in core.step(event).commands {
                match command {
                    DispatchCommand::ScheduleDebounce { generation, .. } => {
                        latest_generation = Some(generation);
                    }
                    DispatchCommand::StartChain { .. } => {
                        in_flight += 1;
                        prop_assert_eq!(in_flight, 1);
                    }
                }
            }
            prop_assert_eq!(core.is_running(0), in_flight == 1);
        }
    }
}
