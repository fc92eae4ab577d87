//! # Linear pipeline stages around the coalescer.
//!
//! ```text
//! upstream bytes ─► read_upstream ─► [String] ─► parse ─► [KeyEvent] ─► Coalescer
//!                        │                                                  │
//!                        └─► fatal RelayError              [KeyEvent] ◄─────┘
//!                                                               │
//!                                         Broadcaster ◄─ [String] ◄─ format
//! ```
//!
//! ## Rules
//! - Every stage owns its input receiver and output sender; dropping the sender
//!   is how a stage tells the next one it is done.
//! - Only the reader observes cancellation directly. Downstream stages drain
//!   what is already queued and exit when their input closes, so the
//!   coalescer's final flush still reaches consumers.
//! - Parse failures are logged and dropped; an upstream failure (I/O error,
//!   oversize line, or EOF) is fatal and reported on the error channel.

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::RelayError;
use crate::events::{KeyEvent, to_line};

/// Longest upstream line accepted before the stream is considered broken.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Reassembles lines from the upstream byte stream and forwards them.
///
/// The read is raced against `token`, so cancellation stops forwarding at once;
/// a blocked read on a non-cancellable source would delay exit until it returns.
pub async fn read_upstream<R>(
    reader: R,
    tx: mpsc::Sender<String>,
    errors: mpsc::Sender<RelayError>,
    token: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    info!("Init upstream reader");
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    loop {
        let next = tokio::select! {
            _ = token.cancelled() => break,
            next = lines.next() => next,
        };

        let reason = match next {
            Some(Ok(line)) => {
                if tx.send(line).await.is_err() {
                    break;
                }
                continue;
            }
            Some(Err(e)) => e.to_string(),
            None => "upstream closed the connection".to_string(),
        };

        let _ = errors.send(RelayError::UpstreamRead { reason }).await;
        break;
    }
    info!("Exit upstream reader");
}

/// Parses raw lines; malformed ones are logged and dropped.
pub async fn parse(mut rx: mpsc::Receiver<String>, tx: mpsc::Sender<KeyEvent>) {
    info!("Init parser");
    while let Some(line) = rx.recv().await {
        info!("In: {line}");
        match KeyEvent::parse(&line) {
            Ok(ev) => {
                if tx.send(ev).await.is_err() {
                    break;
                }
            }
            Err(e) => error!(label = e.as_label(), "{e}"),
        }
    }
    info!("Exit parser");
}

/// Renders coalesced events to wire lines.
pub async fn format(mut rx: mpsc::Receiver<KeyEvent>, tx: mpsc::Sender<String>) {
    info!("Init formatter");
    while let Some(ev) = rx.recv().await {
        let line = to_line(&ev);
        info!("Out: {line}");
        if tx.send(line).await.is_err() {
            break;
        }
    }
    info!("Exit formatter");
}
