//! # Relay: wires the pipeline, watches for fatal errors, drives shutdown.
//!
//! The [`Relay`] owns the bound listener, the connection [`Registry`] and the
//! configuration. [`Relay::run`] spawns every stage, waits for either a
//! shutdown request or a fatal upstream error, then cancels and drains within
//! [`Config::grace`].
//!
//! ## High-level architecture
//! ```text
//! Spawned stages (JoinSet):
//!   read_upstream ─► parse ─► Coalescer::run ─► format ─► Broadcaster::run
//!        │                                                      │
//!        └─► errors (fatal)                                     ▼
//!                                                        Registry snapshot
//!   Listener::run ─► Registry::add ─► connection::serve (one task per consumer)
//!
//! Tokens:
//!   shutdown     ─► read_upstream, Coalescer::run, Listener::run
//!   connections  ─► connection::serve   (cancelled by Broadcaster on exit,
//!                                        or by the relay when grace runs out)
//!
//! Shutdown path:
//!   shutdown future resolves  |  fatal error received
//!             └─► shutdown.cancel()
//!                   reader stops ─► parser closes ─► coalescer flushes pending
//!                   ─► formatter closes ─► broadcaster pushes last lines, exits
//!                   ─► connections.cancel() ─► writers flush, deregister, close
//!             └─► wait (stages joined AND registry drained) up to grace:
//!                    ├─ Ok       → "Exit lirc relay"
//!                    └─ Timeout  → GraceExceeded (unless a fatal error wins)
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::broadcaster::Broadcaster;
use super::coalescer::Coalescer;
use super::listener::Listener;
use super::registry::Registry;
use super::shutdown::ShutdownSignals;
use super::stages;
use crate::config::Config;
use crate::error::RelayError;

/// Event relay between one upstream lircd socket and any number of consumers.
pub struct Relay {
    cfg: Config,
    listener: Listener,
    registry: Arc<Registry>,
}

impl Relay {
    /// Connects to the upstream socket at `cfg.input_path`.
    pub async fn connect(cfg: &Config) -> Result<UnixStream, RelayError> {
        info!("Listen socket: {}", cfg.input_path.display());
        UnixStream::connect(&cfg.input_path)
            .await
            .map_err(|source| RelayError::UpstreamConnect {
                path: cfg.input_path.display().to_string(),
                source,
            })
    }

    /// Binds the downstream socket; consumers may connect once [`Relay::run`] starts.
    pub fn bind(cfg: Config) -> Result<Self, RelayError> {
        let listener = Listener::bind(&cfg)?;
        Ok(Self {
            cfg,
            listener,
            registry: Registry::new(),
        })
    }

    /// Registry of connected consumers.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Runs over `upstream` until SIGINT/SIGTERM/SIGQUIT or a fatal error.
    ///
    /// Signal handlers are installed before any stage starts; failing to
    /// install them is reported as [`RelayError::Signals`].
    pub async fn run_until_signal<R>(self, upstream: R) -> Result<(), RelayError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let signals = ShutdownSignals::register().map_err(|source| RelayError::Signals { source })?;
        self.run(upstream, async {
            let name = signals.recv().await;
            info!("Got exit signal {name}");
        })
        .await
    }

    /// Runs the pipeline over `upstream` until `shutdown_requested` resolves or
    /// the upstream fails.
    ///
    /// Returns the fatal error if the upstream failed, [`RelayError::GraceExceeded`]
    /// if a requested shutdown did not drain in time, `Ok(())` otherwise.
    pub async fn run<R, F>(self, upstream: R, shutdown_requested: F) -> Result<(), RelayError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        F: Future<Output = ()> + Send,
    {
        let Relay {
            cfg,
            listener,
            registry,
        } = self;
        let shutdown = CancellationToken::new();
        let connections = CancellationToken::new();
        let (errors_tx, mut errors_rx) = mpsc::channel(1);

        let mut set = JoinSet::new();
        spawn_pipeline(&mut set, &cfg, &registry, upstream, errors_tx, &shutdown, &connections);
        set.spawn(listener.run(Arc::clone(&registry), shutdown.clone(), connections.clone()));
        info!("Relay started");

        let fatal = tokio::select! {
            _ = shutdown_requested => None,
            Some(err) = errors_rx.recv() => {
                error!(label = err.as_label(), "{err}");
                Some(err)
            }
        };

        shutdown.cancel();
        let drained = async {
            while set.join_next().await.is_some() {}
            registry.drained().await;
        };

        match tokio::time::timeout(cfg.grace, drained).await {
            Ok(()) => info!("Exit lirc relay"),
            Err(_) => {
                connections.cancel();
                warn!(connections = registry.len(), "Timeout graceful shutdown");
                if fatal.is_none() {
                    return Err(RelayError::GraceExceeded {
                        grace: cfg.grace,
                        connections: registry.len(),
                    });
                }
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Spawns reader → parser → coalescer → formatter → broadcaster, linked by bounded queues.
fn spawn_pipeline<R>(
    set: &mut JoinSet<()>,
    cfg: &Config,
    registry: &Arc<Registry>,
    upstream: R,
    errors: mpsc::Sender<RelayError>,
    shutdown: &CancellationToken,
    connections: &CancellationToken,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let cap = cfg.queue_capacity_clamped();
    let (raw_tx, raw_rx) = mpsc::channel(cap);
    let (event_tx, event_rx) = mpsc::channel(cap);
    let (coalesced_tx, coalesced_rx) = mpsc::channel(cap);
    let (line_tx, line_rx) = mpsc::channel(cap);

    set.spawn(stages::read_upstream(upstream, raw_tx, errors, shutdown.clone()));
    set.spawn(stages::parse(raw_rx, event_tx));
    set.spawn(Coalescer::from_config(cfg).run(event_rx, coalesced_tx, shutdown.clone()));
    set.spawn(stages::format(coalesced_rx, line_tx));
    set.spawn(
        Broadcaster::new(Arc::clone(registry), cfg.write_timeout).run(line_rx, connections.clone()),
    );
}
