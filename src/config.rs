//! # Global relay configuration.
//!
//! Provides [`Config`] centralized settings for the relay runtime.
//!
//! Config is used in two ways:
//! 1. **Relay creation**: `Relay::bind(config)`
//! 2. **Stage wiring**: timings for the coalescer, write budget for the broadcaster,
//!    queue sizes for every stage.
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → clamped to 1 (tokio channels reject zero)
//! - `socket_owner = None` → keep whatever owner the process created the socket with

use std::path::PathBuf;
use std::time::Duration;

/// Global configuration for the relay runtime.
///
/// Defines:
/// - **Endpoints**: upstream socket to read, downstream socket to serve
/// - **Coalescing**: quiet period and hold threshold
/// - **Fan-out**: per-write budget, queue sizes, record delimiter
/// - **Shutdown**: grace period for the final drain
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Upstream lircd socket.
    pub input_path: PathBuf,

    /// Socket the relay listens on for consumers.
    ///
    /// Any stale file at this path is removed before binding.
    pub output_path: PathBuf,

    /// Time without a matching repeat after which a pending press is released.
    pub quiet_period: Duration,

    /// Time since the first press after which a repeat chain is reported as `_HOLD`.
    pub hold_threshold: Duration,

    /// Budget for handing one line to one consumer's queue.
    ///
    /// A consumer that misses it simply does not get that line.
    pub write_timeout: Duration,

    /// Capacity of every inter-stage and per-connection queue.
    ///
    /// Kept small so backpressure surfaces instead of piling up. Minimum value is 1.
    pub queue_capacity: usize,

    /// Maximum time to wait for stages and connections to wind down after cancellation.
    pub grace: Duration,

    /// File mode applied to the listening socket after bind.
    pub socket_mode: u32,

    /// Optional `(uid, gid)` applied to the listening socket after bind.
    pub socket_owner: Option<(u32, u32)>,

    /// Appended to every record written to a consumer.
    pub delimiter: String,
}

impl Config {
    /// Returns a queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Record delimiter as bytes.
    #[inline]
    pub fn delimiter(&self) -> &[u8] {
        self.delimiter.as_bytes()
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `input_path = /var/run/lirc/lircd`
    /// - `output_path = /var/run/lirc/lircd1`
    /// - `quiet_period = 100ms`, `hold_threshold = 500ms`
    /// - `write_timeout = 20ms`
    /// - `queue_capacity = 2`
    /// - `grace = 1s`
    /// - `socket_mode = 0o666`, no owner change
    /// - `delimiter = "\n"`
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("/var/run/lirc/lircd"),
            output_path: PathBuf::from("/var/run/lirc/lircd1"),
            quiet_period: Duration::from_millis(100),
            hold_threshold: Duration::from_millis(500),
            write_timeout: Duration::from_millis(20),
            queue_capacity: 2,
            grace: Duration::from_secs(1),
            socket_mode: 0o666,
            socket_owner: None,
            delimiter: "\n".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cfg = Config {
            queue_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.queue_capacity_clamped(), 1);
    }
}
