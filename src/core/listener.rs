//! # Consumer listener: the downstream Unix socket.
//!
//! [`Listener::bind`] prepares the socket path:
//! 1. remove a stale socket file (a missing file is fine),
//! 2. bind,
//! 3. apply `socket_mode` (and `socket_owner`, if configured) so any local user
//!    can connect. This deliberately relaxes default access control for a
//!    single-host deployment.
//!
//! [`Listener::run`] accepts connections until cancelled. Each connection is
//! registered **before** its writer task is spawned, so a consumer that has
//! been accepted is part of every later broadcast snapshot.

use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::connection;
use super::registry::Registry;
use crate::config::Config;
use crate::error::RelayError;

/// Pause after a failed accept, so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(50);

/// Bound downstream socket.
pub struct Listener {
    inner: UnixListener,
    path: PathBuf,
    queue_capacity: usize,
    delimiter: Arc<[u8]>,
}

impl Listener {
    /// Removes a stale socket, binds `cfg.output_path` and relaxes its permissions.
    pub fn bind(cfg: &Config) -> Result<Self, RelayError> {
        let path = cfg.output_path.clone();
        info!("Open write socket at: {}", path.display());

        let bind_err = |source| RelayError::Bind {
            path: path.display().to_string(),
            source,
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(bind_err(e)),
        }
        let inner = UnixListener::bind(&path).map_err(bind_err)?;

        relax_permissions(&path, cfg.socket_mode, cfg.socket_owner).map_err(|source| {
            RelayError::SocketPermissions {
                path: path.display().to_string(),
                source,
            }
        })?;

        Ok(Self {
            inner,
            path,
            queue_capacity: cfg.queue_capacity_clamped(),
            delimiter: Arc::from(cfg.delimiter()),
        })
    }

    /// Socket path this listener is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts consumers until `token` is cancelled; writers follow `connections`.
    pub async fn run(
        self,
        registry: Arc<Registry>,
        token: CancellationToken,
        connections: CancellationToken,
    ) {
        info!("Init accept loop");
        loop {
            let accepted = tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.inner.accept() => accepted,
            };

            let stream = match accepted {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    error!("can't accept connection: {e}");
                    tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                    continue;
                }
            };

            let (tx, rx) = mpsc::channel(self.queue_capacity);
            let id = registry.add(tx).await;
            info!(conn = %id, "New connection");
            tokio::spawn(connection::serve(
                stream,
                id,
                rx,
                Arc::clone(&registry),
                Arc::clone(&self.delimiter),
                connections.clone(),
            ));
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("can't remove {}: {e}", self.path.display());
        }
        info!("Exit accept loop");
    }
}

fn relax_permissions(path: &Path, mode: u32, owner: Option<(u32, u32)>) -> std::io::Result<()> {
    if let Some((uid, gid)) = owner {
        std::os::unix::fs::chown(path, Some(uid), Some(gid))?;
    }
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}
