// src/proxy/mod.rs

//! Proxy coordination: the pause/resume [`gate`] shared by watch-triggered
//! chains and the optional TCP dev proxy [`server`] that honours it.

pub mod gate;
pub mod server;

pub use gate::{PauseGuard, ProxyGate};
pub use server::{ProxyConfig, run_proxy, serve};
