// src/engine/core.rs

//! Pure dispatcher state machine.
//!
//! Consumes [`DispatchEvent`]s and produces the [`DispatchCommand`]s the IO
//! shell (`engine::runtime::Dispatcher`) should carry out. It has no
//! channels, no Tokio types and does no IO, so it can be tested without a
//! runtime.
//!
//! Per binding:
//!
//! ```text
//! Idle --change--> Debouncing --quiet window--> Running --done--> Idle
//!                  (change restarts window)     (change sets pending;
//!                                                done + pending runs once more)
//! ```

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::engine::{Binding, BindingId, DispatchCommand, DispatchEvent};
use crate::types::ChangeKind;

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<DispatchCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Debouncing { generation: u64 },
    Running { pending: bool },
}

#[derive(Debug)]
struct Slot {
    binding: Binding,
    phase: Phase,
    generation: u64,
}

#[derive(Debug)]
pub struct DispatchCore {
    slots: Vec<Slot>,
    debounce: Duration,
    shutting_down: bool,
}

impl DispatchCore {
    pub fn new(bindings: Vec<Binding>, debounce: Duration) -> Self {
        let slots = bindings
            .into_iter()
            .map(|binding| Slot {
                binding,
                phase: Phase::Idle,
                generation: 0,
            })
            .collect();
        Self {
            slots,
            debounce,
            shutting_down: false,
        }
    }

    pub fn binding(&self, id: BindingId) -> Option<&Binding> {
        self.slots.get(id).map(|s| &s.binding)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True if the binding's chain is currently running.
    pub fn is_running(&self, id: BindingId) -> bool {
        matches!(
            self.slots.get(id).map(|s| s.phase),
            Some(Phase::Running { .. })
        )
    }

    /// True if a re-run is queued behind the current run.
    pub fn is_pending(&self, id: BindingId) -> bool {
        matches!(
            self.slots.get(id).map(|s| s.phase),
            Some(Phase::Running { pending: true })
        )
    }

    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(|s| s.phase == Phase::Idle)
    }

    fn any_running(&self) -> bool {
        self.slots
            .iter()
            .any(|s| matches!(s.phase, Phase::Running { .. }))
    }

    /// Handle a single event, updating state and returning the commands for
    /// the IO shell.
    pub fn step(&mut self, event: DispatchEvent) -> CoreStep {
        let commands = match event {
            DispatchEvent::PathChanged { path, kind } => self.on_path_changed(&path, kind),
            DispatchEvent::DebounceElapsed {
                binding,
                generation,
            } => self.on_debounce_elapsed(binding, generation),
            DispatchEvent::ChainFinished { binding, success } => {
                self.on_chain_finished(binding, success)
            }
            DispatchEvent::ShutdownRequested => self.on_shutdown(),
        };

        let keep_running = !(self.shutting_down && !self.any_running());
        CoreStep {
            commands,
            keep_running,
        }
    }

    fn on_path_changed(&mut self, path: &Path, kind: ChangeKind) -> Vec<DispatchCommand> {
        if self.shutting_down {
            return Vec::new();
        }

        let mut commands = Vec::new();
        for (id, slot) in self.slots.iter_mut().enumerate() {
            if !slot.binding.matches(path, kind) {
                continue;
            }
            match slot.phase {
                Phase::Idle | Phase::Debouncing { .. } => {
                    slot.generation += 1;
                    slot.phase = Phase::Debouncing {
                        generation: slot.generation,
                    };
                    debug!(binding = %slot.binding.name, path = ?path, "change; (re)starting debounce");
                    commands.push(DispatchCommand::ScheduleDebounce {
                        binding: id,
                        generation: slot.generation,
                        after: self.debounce,
                    });
                }
                Phase::Running { .. } => {
                    debug!(binding = %slot.binding.name, path = ?path, "change while running; marking pending");
                    slot.phase = Phase::Running { pending: true };
                }
            }
        }
        commands
    }

    fn on_debounce_elapsed(&mut self, id: BindingId, generation: u64) -> Vec<DispatchCommand> {
        let Some(slot) = self.slots.get_mut(id) else {
            return Vec::new();
        };
        match slot.phase {
            Phase::Debouncing { generation: current } if current == generation => {
                if self.shutting_down {
                    slot.phase = Phase::Idle;
                    return Vec::new();
                }
                info!(binding = %slot.binding.name, chain = %slot.binding.chain, "starting run");
                slot.phase = Phase::Running { pending: false };
                vec![DispatchCommand::StartChain { binding: id }]
            }
            _ => Vec::new(),
        }
    }

    fn on_chain_finished(&mut self, id: BindingId, success: bool) -> Vec<DispatchCommand> {
        let shutting_down = self.shutting_down;
        let Some(slot) = self.slots.get_mut(id) else {
            return Vec::new();
        };
        debug!(binding = %slot.binding.name, success, "run finished");
        match slot.phase {
            Phase::Running { pending: true } if !shutting_down => {
                info!(binding = %slot.binding.name, "changes arrived during the run; running again");
                slot.phase = Phase::Running { pending: false };
                vec![DispatchCommand::StartChain { binding: id }]
            }
            Phase::Running { .. } => {
                slot.phase = Phase::Idle;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_shutdown(&mut self) -> Vec<DispatchCommand> {
        self.shutting_down = true;
        for slot in &mut self.slots {
            slot.phase = match slot.phase {
                Phase::Running { .. } => Phase::Running { pending: false },
                _ => Phase::Idle,
            };
        }
        Vec::new()
    }
}
