use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use buildwatch::engine::{Binding, ChainExecutor, ChainFuture};
use buildwatch::errors::BuildError;
use buildwatch::tasks::{Task, TaskContext, TaskFuture};

/// A fake chain executor that:
/// - records which bindings were "run", in start order
/// - optionally announces each start on a channel
/// - sleeps for `delay` to simulate a long chain
/// - fails the bindings named in `failing`
/// - panics inside the bindings named in `panicking`.
#[derive(Debug, Clone, Default)]
pub struct FakeChainExecutor {
    runs: Arc<Mutex<Vec<String>>>,
    delay: Duration,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    started: Option<mpsc::UnboundedSender<String>>,
}

impl FakeChainExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, binding: &str) -> Self {
        self.failing.insert(binding.to_string());
        self
    }

    pub fn panicking(mut self, binding: &str) -> Self {
        self.panicking.insert(binding.to_string());
        self
    }

    /// Receive the binding name every time a run starts.
    pub fn notify_starts(&mut self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.started = Some(tx);
        rx
    }

    /// Shared handle to the run log.
    pub fn runs(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.runs)
    }
}

impl ChainExecutor for FakeChainExecutor {
    fn run_binding<'a>(&'a self, binding: &'a Binding) -> ChainFuture<'a> {
        Box::pin(async move {
            self.runs.lock().unwrap().push(binding.name.clone());
            if let Some(tx) = &self.started {
                let _ = tx.send(binding.name.clone());
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.panicking.contains(&binding.name) {
                panic!("fake panic in {}", binding.name);
            }
            if self.failing.contains(&binding.name) {
                return Err(BuildError::task_failed(&binding.name, "fake failure"));
            }
            Ok(())
        })
    }
}

/// A task that appends its name to a shared log and can be told to fail.
///
/// While running it records whether the proxy gate was paused, so tests can
/// assert on gating.
#[derive(Debug, Clone)]
pub struct RecordingTask {
    pub name: String,
    pub log: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
    pub saw_pause: Arc<Mutex<Vec<bool>>>,
}

impl RecordingTask {
    pub fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            fail: false,
            saw_pause: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Task for RecordingTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            self.log.lock().unwrap().push(self.name.clone());
            self.saw_pause.lock().unwrap().push(ctx.gate.is_paused());
            if self.fail {
                return Err(BuildError::task_failed(&self.name, "exit 1: boom"));
            }
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("record {}", self.name)
    }
}

/// A task that sleeps for `delay` and tracks how many of its runs overlap.
#[derive(Debug, Clone)]
pub struct OverlapTask {
    pub delay: Duration,
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl OverlapTask {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            live: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Highest number of runs seen in flight at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl Task for OverlapTask {
    fn run<'a>(&'a self, _ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.live.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("sleep {:?}", self.delay)
    }
}
