// src/proxy/server.rs

//! TCP forwarding proxy in front of the upstream dev server.
//!
//! Each accepted connection is admitted through the [`ProxyGate`] before it
//! is spliced to the upstream, so browsers never see half-replaced assets.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::gate::ProxyGate;

/// Where the proxy listens and where it forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub listen: String,
    pub upstream: String,
}

/// Bind `config.listen` and serve until `shutdown` flips to `true`.
pub async fn run_proxy(
    config: ProxyConfig,
    gate: ProxyGate,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding proxy listener on {}", config.listen))?;
    serve(listener, config.upstream, gate, shutdown).await
}

/// Accept loop over an already-bound listener.
pub async fn serve(
    listener: TcpListener,
    upstream: String,
    gate: ProxyGate,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let local = listener.local_addr().context("reading proxy listen address")?;
    info!(listen = %local, upstream = %upstream, "dev proxy started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("dev proxy stopping");
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let gate = gate.clone();
                        let upstream = upstream.clone();
                        tokio::spawn(async move {
                            if let Err(e) = forward(stream, peer, &upstream, gate).await {
                                warn!(peer = %peer, error = %format!("{e:#}"), "proxy connection failed");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "proxy accept failed"),
                }
            }
        }
    }

    Ok(())
}

async fn forward(
    mut inbound: TcpStream,
    peer: SocketAddr,
    upstream: &str,
    gate: ProxyGate,
) -> Result<()> {
    gate.admit().await;

    let mut outbound = TcpStream::connect(upstream)
        .await
        .with_context(|| format!("connecting to upstream {upstream}"))?;

    let (up, down) = copy_bidirectional(&mut inbound, &mut outbound)
        .await
        .context("forwarding proxy traffic")?;
    debug!(peer = %peer, bytes_up = up, bytes_down = down, "proxy connection closed");
    Ok(())
}
