// src/engine/executor.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Result;
use crate::tasks::{TaskContext, TaskRegistry};

use super::Binding;

pub type ChainFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Runs the chain behind a binding.
///
/// The dispatcher talks to this trait only, so tests can swap in a fake
/// that records runs instead of spawning processes.
pub trait ChainExecutor: Send + Sync {
    fn run_binding<'a>(&'a self, binding: &'a Binding) -> ChainFuture<'a>;
}

/// Production executor: runs registry chains, holding the proxy gate for
/// gated bindings.
#[derive(Debug, Clone)]
pub struct OrchestratorExecutor {
    registry: Arc<TaskRegistry>,
    ctx: TaskContext,
}

impl OrchestratorExecutor {
    pub fn new(registry: Arc<TaskRegistry>, ctx: TaskContext) -> Self {
        Self { registry, ctx }
    }
}

impl ChainExecutor for OrchestratorExecutor {
    fn run_binding<'a>(&'a self, binding: &'a Binding) -> ChainFuture<'a> {
        Box::pin(async move {
            let _pause = binding.gate_proxy.then(|| self.ctx.gate.hold());
            self.registry.run_chain(binding.chain, &self.ctx).await
        })
    }
}
