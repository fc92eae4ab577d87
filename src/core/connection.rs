//! # Per-connection writer.
//!
//! Each accepted consumer gets one task that owns the connection and the
//! receiving half of its sink queue:
//!
//! ```text
//! Broadcaster ── push ──► [queue] ──► serve() ──► write(line + delimiter)
//!                                        │
//!                                        ├─ write error  → deregister, close
//!                                        └─ cancelled    → flush queue, deregister, close
//! ```
//!
//! The task always deregisters its sink before returning; that is what lets
//! [`Registry::drained`](super::registry::Registry::drained) confirm shutdown.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::registry::{Registry, SinkId};
use crate::error::SinkError;

/// Writes queued lines to `conn` until it fails or `token` is cancelled.
pub async fn serve<W>(
    mut conn: W,
    id: SinkId,
    mut rx: mpsc::Receiver<Arc<str>>,
    registry: Arc<Registry>,
    delimiter: Arc<[u8]>,
    token: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            _ = token.cancelled() => {
                while let Ok(line) = rx.try_recv() {
                    if let Err(e) = write_record(&mut conn, &line, &delimiter).await {
                        error!(conn = %id, label = e.as_label(), "{e}");
                        break;
                    }
                }
                break;
            }
            line = rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        match write_record(&mut conn, &line, &delimiter).await {
            Ok(n) => debug!(conn = %id, "Wrote {n} bytes"),
            Err(e) => {
                error!(conn = %id, label = e.as_label(), "{e}");
                break;
            }
        }
    }

    registry.remove(id).await;
    let _ = conn.shutdown().await;
}

async fn write_record<W>(conn: &mut W, line: &str, delimiter: &[u8]) -> Result<usize, SinkError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(line.len() + delimiter.len());
    buf.extend_from_slice(line.as_bytes());
    buf.extend_from_slice(delimiter);

    let res = async {
        conn.write_all(&buf).await?;
        conn.flush().await
    }
    .await;

    res.map(|()| buf.len()).map_err(|source| SinkError::Write {
        line: line.to_string(),
        source,
    })
}
