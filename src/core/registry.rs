//! # Connection registry - identity-keyed set of consumer sinks.
//!
//! Every connected consumer is represented by a [`Sink`]: the sending half of
//! that connection's bounded queue plus a registry-assigned id.
//!
//! ## Architecture
//! ```text
//! accept loop ──► add(sender) ──┐
//!                               ├─► mutate (serialized) ─► ArcSwap<Vec<Arc<Sink>>>
//! writer exit ──► remove(id) ───┘                                │
//!                                                   snapshot() ◄─┘  (lock-free load)
//!                                                        │
//!                                                   Broadcaster
//! ```
//!
//! ## Rules
//! - Mutations are serialized by one async mutex and publish a fresh `Vec`
//!   (copy-on-write); a snapshot already taken never changes.
//! - Snapshots never lock, so broadcast iteration cannot block add/remove.
//! - Removal is idempotent; it is the only way a sink leaves the set.
//! - The live count is mirrored into a `watch` channel for [`Registry::drained`].

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::info;

use crate::error::SinkError;

/// Identity of a registered sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Write destination of one consumer connection.
#[derive(Debug)]
pub struct Sink {
    id: SinkId,
    tx: mpsc::Sender<Arc<str>>,
}

impl Sink {
    /// Registry-assigned identity.
    pub fn id(&self) -> SinkId {
        self.id
    }

    /// Hands one line to the connection's queue, waiting at most `timeout`.
    pub async fn push(&self, line: Arc<str>, timeout: Duration) -> Result<(), SinkError> {
        match tokio::time::timeout(timeout, self.tx.send(line)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SinkError::Closed),
            Err(_elapsed) => Err(SinkError::Timeout { timeout }),
        }
    }
}

/// Set of active consumer sinks.
pub struct Registry {
    sinks: ArcSwap<Vec<Arc<Sink>>>,
    /// Serializes every add/remove; holds the last allocated id.
    mutate: Mutex<u64>,
    count: watch::Sender<usize>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        let (count, _) = watch::channel(0);
        Arc::new(Self {
            sinks: ArcSwap::from_pointee(Vec::new()),
            mutate: Mutex::new(0),
            count,
        })
    }

    /// Registers a connection's queue sender and returns its id.
    pub async fn add(&self, tx: mpsc::Sender<Arc<str>>) -> SinkId {
        let mut last_id = self.mutate.lock().await;
        *last_id += 1;
        let id = SinkId(*last_id);

        let mut sinks: Vec<Arc<Sink>> = self.sinks.load().iter().cloned().collect();
        sinks.push(Arc::new(Sink { id, tx }));
        self.publish(sinks);

        info!(conn = %id, "Add conn. Total {}", self.len());
        id
    }

    /// Unregisters a sink; returns `false` if it was already gone.
    pub async fn remove(&self, id: SinkId) -> bool {
        let _guard = self.mutate.lock().await;

        let current = self.sinks.load();
        if !current.iter().any(|s| s.id == id) {
            return false;
        }
        let sinks: Vec<Arc<Sink>> = current.iter().filter(|s| s.id != id).cloned().collect();
        self.publish(sinks);

        info!(conn = %id, "Drop conn. Remaining {}", self.len());
        true
    }

    /// Current sinks; unaffected by later add/remove calls.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Sink>>> {
        self.sinks.load_full()
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        self.sinks.load().len()
    }

    /// True if no sink is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completes once the registry is empty.
    pub async fn drained(&self) {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn publish(&self, sinks: Vec<Arc<Sink>>) {
        let len = sinks.len();
        self.sinks.store(Arc::new(sinks));
        self.count.send_replace(len);
    }
}
