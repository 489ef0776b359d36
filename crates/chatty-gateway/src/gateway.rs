//! Listener and shared server state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::net::TcpListener;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info};

use chatty_db::Store;

use crate::config::GatewayConfig;
use crate::connection;
use crate::presence::Presence;

/// Shared state for every connection task.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    store: Arc<dyn Store>,
    presence: Presence,
    config: GatewayConfig,
    /// One async lock per group, serializing membership changes.
    group_locks: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>,
}

impl Gateway {
    pub fn new(store: Arc<dyn Store>, config: GatewayConfig) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                store,
                presence: Presence::new(),
                config,
                group_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    pub fn presence(&self) -> &Presence {
        &self.inner.presence
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Take the membership lock for `group_id`.
    ///
    /// Locks that nobody holds or waits on are dropped from the table here,
    /// so it only ever tracks groups with a command in flight.
    pub async fn group_lock(&self, group_id: u64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .inner
                .group_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(group_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Accept connections until the task is cancelled.
    pub async fn run(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("new connection from {}", peer);
                    let gateway = self.clone();
                    tokio::spawn(async move {
                        connection::handle_connection(gateway, stream, peer).await;
                    });
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
    }
}
