// src/proxy/gate.rs

//! Pause/resume gate in front of the live dev server.
//!
//! While paused, every request that asks to be admitted is held in a FIFO
//! queue. Pauses nest: the gate only opens again when every `pause()` has
//! been matched by a `resume()`, and then releases the held requests in
//! arrival order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct GateState {
    depth: usize,
    held: VecDeque<oneshot::Sender<()>>,
    shut_down: bool,
}

/// Shared handle to the gate. Cloning yields another handle to the same gate.
#[derive(Debug, Clone, Default)]
pub struct ProxyGate {
    state: Arc<Mutex<GateState>>,
}

impl ProxyGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Increase the pause depth. No effect after [`ProxyGate::shutdown`].
    pub fn pause(&self) {
        let mut state = self.lock();
        if state.shut_down {
            debug!("pause after shutdown ignored");
            return;
        }
        state.depth += 1;
        if state.depth == 1 {
            info!("proxy paused");
        } else {
            debug!(depth = state.depth, "proxy pause nested");
        }
    }

    /// Decrease the pause depth; at zero the gate opens and held requests are
    /// released first-in first-out.
    pub fn resume(&self) {
        let mut state = self.lock();
        if state.depth == 0 {
            if !state.shut_down {
                warn!("resume without matching pause ignored");
            }
            return;
        }
        state.depth -= 1;
        if state.depth > 0 {
            debug!(depth = state.depth, "proxy still paused");
            return;
        }
        let released = release_all(&mut state);
        info!(released, "proxy resumed");
    }

    /// Pause now and resume when the returned guard is dropped.
    #[must_use = "the gate resumes as soon as the guard is dropped"]
    pub fn hold(&self) -> PauseGuard {
        self.pause();
        PauseGuard { gate: self.clone() }
    }

    pub fn is_paused(&self) -> bool {
        self.lock().depth > 0
    }

    pub fn depth(&self) -> usize {
        self.lock().depth
    }

    /// Number of requests currently held.
    pub fn held(&self) -> usize {
        self.lock().held.len()
    }

    /// Wait until the gate is open. Returns immediately when it already is.
    pub async fn admit(&self) {
        let rx = {
            let mut state = self.lock();
            if state.depth == 0 || state.shut_down {
                return;
            }
            let (tx, rx) = oneshot::channel();
            state.held.push_back(tx);
            debug!(held = state.held.len(), "request held by paused proxy");
            rx
        };
        // A dropped sender also means "go".
        let _ = rx.await;
    }

    /// Release every held request and keep the gate open for good.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.shut_down = true;
        state.depth = 0;
        let released = release_all(&mut state);
        info!(released, "proxy gate shut down");
    }
}

fn release_all(state: &mut GateState) -> usize {
    let mut released = 0;
    while let Some(tx) = state.held.pop_front() {
        // The requester may have given up; that is fine.
        let _ = tx.send(());
        released += 1;
    }
    released
}

/// RAII pause: resumes the gate on drop, whichever way the holder exits.
#[derive(Debug)]
pub struct PauseGuard {
    gate: ProxyGate,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.gate.resume();
    }
}
