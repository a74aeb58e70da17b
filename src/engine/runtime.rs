// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::proxy::ProxyGate;

use super::core::DispatchCore;
use super::executor::ChainExecutor;
use super::{Binding, BindingId, DispatchCommand, DispatchEvent};

/// Capacity of the dispatcher's event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Drives [`DispatchCore`] from `DispatchEvent`s and carries out its
/// commands: debounce timers and chain runs are spawned tasks that report
/// back through the same channel.
///
/// On exit (shutdown requested and no chain still running) the proxy gate
/// is shut down so no request stays held.
pub struct Dispatcher<E: ChainExecutor + 'static> {
    core: DispatchCore,
    bindings: Arc<[Binding]>,
    executor: Arc<E>,
    gate: ProxyGate,
    event_tx: mpsc::Sender<DispatchEvent>,
    event_rx: mpsc::Receiver<DispatchEvent>,
}

impl<E: ChainExecutor + 'static> fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ChainExecutor + 'static> Dispatcher<E> {
    pub fn new(bindings: Vec<Binding>, debounce: Duration, executor: E, gate: ProxyGate) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            core: DispatchCore::new(bindings.clone(), debounce),
            bindings: bindings.into(),
            executor: Arc::new(executor),
            gate,
            event_tx,
            event_rx,
        }
    }

    /// Sender for watcher events and shutdown requests.
    pub fn sender(&self) -> mpsc::Sender<DispatchEvent> {
        self.event_tx.clone()
    }

    /// Main event loop. Returns once shutdown was requested and every
    /// in-flight chain has finished.
    pub async fn run(mut self) -> Result<()> {
        info!(bindings = self.bindings.len(), "dispatcher started");

        loop {
            let Some(event) = self.event_rx.recv().await else {
                info!("dispatcher event channel closed; exiting");
                break;
            };
            debug!(?event, "dispatcher received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command);
            }

            if !step.keep_running {
                info!("shutdown complete; stopping dispatcher");
                break;
            }
        }

        self.gate.shutdown();
        Ok(())
    }

    fn execute_command(&self, command: DispatchCommand) {
        match command {
            DispatchCommand::ScheduleDebounce {
                binding,
                generation,
                after,
            } => {
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx
                        .send(DispatchEvent::DebounceElapsed {
                            binding,
                            generation,
                        })
                        .await;
                });
            }
            DispatchCommand::StartChain { binding } => self.spawn_chain(binding),
        }
    }

    fn spawn_chain(&self, id: BindingId) {
        let tx = self.event_tx.clone();
        let Some(binding) = self.bindings.get(id) else {
            warn!(binding = id, "unknown binding; ignoring run");
            return;
        };
        let (name, chain) = (binding.name.clone(), binding.chain);
        let bindings = Arc::clone(&self.bindings);
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            // The run gets its own task so a panic still reports back.
            let run = tokio::spawn(async move { executor.run_binding(&bindings[id]).await });
            let success = match run.await {
                Ok(Ok(())) => {
                    info!(binding = %name, chain = %chain, "run succeeded");
                    true
                }
                Ok(Err(err)) => {
                    error!(binding = %name, chain = %chain, error = %err, "run failed; still watching");
                    false
                }
                Err(err) => {
                    error!(binding = %name, chain = %chain, error = %err, "run aborted; still watching");
                    false
                }
            };
            let _ = tx
                .send(DispatchEvent::ChainFinished {
                    binding: id,
                    success,
                })
                .await;
        });
    }
}
