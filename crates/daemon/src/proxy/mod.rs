// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional TCP connection balancer fronting an app's public port (§4.8).

use fw_core::WorkerId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to bind proxy listener on port {0}: {1}")]
    Bind(u16, #[source] std::io::Error),
}

struct Shared {
    upstream_ports: Mutex<BTreeMap<WorkerId, u16>>,
    cursor: AtomicUsize,
}

/// Owns one TCP listener on an app's public port and round-robins accepted
/// connections to the per-worker upstream ports currently registered (§4.8).
///
/// Carries no session state: a connection's upstream choice is fixed at
/// connect time for its lifetime.
pub struct ProxyCluster {
    shared: Arc<Shared>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl ProxyCluster {
    pub async fn start(public_port: u16) -> Result<Self, ProxyError> {
        let listener = TcpListener::bind(("0.0.0.0", public_port))
            .await
            .map_err(|e| ProxyError::Bind(public_port, e))?;
        let shared = Arc::new(Shared { upstream_ports: Mutex::new(BTreeMap::new()), cursor: AtomicUsize::new(0) });
        let accept_shared = shared.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((inbound, _addr)) => {
                        let shared = accept_shared.clone();
                        tokio::spawn(async move {
                            if let Err(e) = proxy_one(inbound, &shared).await {
                                debug!("proxy connection ended: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        warn!("proxy accept error: {e}");
                        return;
                    }
                }
            }
        });
        Ok(Self { shared, accept_task: Mutex::new(Some(accept_task)) })
    }

    pub fn add_worker(&self, id: WorkerId, upstream_port: u16) {
        self.shared.upstream_ports.lock().insert(id, upstream_port);
    }

    pub fn remove_worker(&self, id: WorkerId) {
        self.shared.upstream_ports.lock().remove(&id);
    }

    pub fn worker_count(&self) -> usize {
        self.shared.upstream_ports.lock().len()
    }

    /// Close the listener and drain existing pipes. Existing connections are
    /// left to finish on their own; only the accept loop is torn down.
    /// Idempotent: a second call is a no-op.
    pub fn stop(&self) {
        if let Some(handle) = self.accept_task.lock().take() {
            handle.abort();
        }
    }
}

async fn proxy_one(mut inbound: TcpStream, shared: &Shared) -> std::io::Result<()> {
    let Some(port) = pick_upstream(shared) else {
        return Err(std::io::Error::other("no workers registered"));
    };
    let mut outbound = TcpStream::connect(("127.0.0.1", port)).await?;
    copy_bidirectional(&mut inbound, &mut outbound).await?;
    Ok(())
}

fn pick_upstream(shared: &Shared) -> Option<u16> {
    let ports = shared.upstream_ports.lock();
    if ports.is_empty() {
        return None;
    }
    let values: Vec<u16> = ports.values().copied().collect();
    let i = shared.cursor.fetch_add(1, Ordering::Relaxed) % values.len();
    Some(values[i])
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
