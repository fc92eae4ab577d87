//! # Broadcaster: bounded-time fan-out of output lines.
//!
//! [`Broadcaster`] takes each formatted line and hands it to every sink in the
//! registry's current snapshot.
//!
//! ## What it guarantees
//! - Pushes for one line run concurrently; a line is finished once every sink
//!   accepted it or ran out of its `write_timeout`.
//! - Per-sink FIFO: a line is never handed out before the previous one finished.
//! - A stalled consumer costs at most `write_timeout` per line.
//!
//! ## What it does **not** guarantee
//! - No retries: a sink that misses its budget simply does not get that line.
//! - No delivery to consumers that connect after the snapshot was taken.
//!
//! ## Diagram
//! ```text
//!    line
//!     │                 (Arc<str> clone per sink, timeout each)
//!     ├──────────────► [queue C1] ─► writer C1 ─► socket
//!     ├──────────────► [queue C2] ─► writer C2 ─► socket
//!     └──────────────► [queue CN] ─► writer CN ─► socket
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::registry::Registry;
use crate::error::SinkError;

/// Outcome of broadcasting one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Sinks that accepted the line.
    pub delivered: usize,
    /// Sinks that timed out or were already closed.
    pub failed: usize,
}

/// Fan-out of output lines over the registry.
pub struct Broadcaster {
    registry: Arc<Registry>,
    write_timeout: Duration,
}

impl Broadcaster {
    /// Creates a broadcaster over `registry` with a per-push budget.
    pub fn new(registry: Arc<Registry>, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    /// Pushes one line to every sink of the current snapshot.
    ///
    /// Sinks whose queue is closed are removed from the registry.
    pub async fn broadcast(&self, line: Arc<str>) -> Delivery {
        let sinks = self.registry.snapshot();
        let pushes = sinks
            .iter()
            .map(|sink| sink.push(Arc::clone(&line), self.write_timeout));
        let results = join_all(pushes).await;

        let mut delivery = Delivery::default();
        for (sink, res) in sinks.iter().zip(results) {
            match res {
                Ok(()) => delivery.delivered += 1,
                Err(e @ SinkError::Closed) => {
                    delivery.failed += 1;
                    debug!(conn = %sink.id(), label = e.as_label(), "{e}");
                    self.registry.remove(sink.id()).await;
                }
                Err(e) => {
                    delivery.failed += 1;
                    error!(conn = %sink.id(), label = e.as_label(), line = %line, "{e}");
                }
            }
        }
        delivery
    }

    /// Drains `rx` until it closes, then cancels `connections` so writers
    /// flush their queues and close.
    pub async fn run(self, mut rx: mpsc::Receiver<String>, connections: CancellationToken) {
        info!("Init write loop");
        while let Some(line) = rx.recv().await {
            self.broadcast(Arc::from(line)).await;
        }
        info!("Exit write loop");
        connections.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_sink_does_not_delay_fast_sink() {
        let reg = Registry::new();
        let (fast_tx, mut fast_rx) = mpsc::channel::<Arc<str>>(2);
        let (slow_tx, _slow_rx) = mpsc::channel::<Arc<str>>(2);
        reg.add(fast_tx).await;
        reg.add(slow_tx).await;

        let received = tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(line) = fast_rx.recv().await {
                got.push(line.to_string());
            }
            got
        });

        let b = Broadcaster::new(Arc::clone(&reg), ms(20));
        let start = Instant::now();
        let mut outcomes = Vec::new();
        for n in 0..10 {
            outcomes.push(b.broadcast(Arc::from(format!("line {n}"))).await);
        }

        // Two lines fill the stalled queue; every later line times out once.
        assert!(outcomes[..2].iter().all(|d| d.delivered == 2));
        assert!(outcomes[2..]
            .iter()
            .all(|d| *d == Delivery { delivered: 1, failed: 1 }));
        assert!(start.elapsed() <= ms(8 * 20 + 5));

        drop(b);
        drop(reg);
        let got = received.await.unwrap();
        assert_eq!(got, (0..10).map(|n| format!("line {n}")).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_closed_sink_is_deregistered() {
        let reg = Registry::new();
        let (tx, rx) = mpsc::channel::<Arc<str>>(2);
        reg.add(tx).await;
        drop(rx);

        let b = Broadcaster::new(Arc::clone(&reg), ms(20));
        let d = b.broadcast(Arc::from("x")).await;
        assert_eq!(d, Delivery { delivered: 0, failed: 1 });
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_removed_sink_gets_no_later_lines() {
        let reg = Registry::new();
        let (kept_tx, mut kept_rx) = mpsc::channel::<Arc<str>>(2);
        let (gone_tx, mut gone_rx) = mpsc::channel::<Arc<str>>(2);
        reg.add(kept_tx).await;
        let gone = reg.add(gone_tx).await;
        assert!(reg.remove(gone).await);

        let b = Broadcaster::new(Arc::clone(&reg), ms(20));
        let d = b.broadcast(Arc::from("id 0 KEY_UP dev")).await;

        assert_eq!(d, Delivery { delivered: 1, failed: 0 });
        assert_eq!(&*kept_rx.recv().await.unwrap(), "id 0 KEY_UP dev");
        // The registry held the only other sender, so the queue is closed and empty.
        assert!(gone_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_cancels_connections_when_input_closes() {
        let reg = Registry::new();
        let (tx, rx) = mpsc::channel(2);
        let connections = CancellationToken::new();
        let handle = tokio::spawn(Broadcaster::new(reg, ms(20)).run(rx, connections.clone()));

        tx.send("id 0 KEY_UP dev".to_string()).await.unwrap();
        drop(tx);
        handle.await.unwrap();
        assert!(connections.is_cancelled());
    }
}
