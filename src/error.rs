//! Error types used by the relay pipeline and its driver.
//!
//! This module defines three enums:
//!
//! - [`ParseError`]: a raw upstream line could not be turned into a [`KeyEvent`](crate::KeyEvent).
//! - [`SinkError`]: delivering a line to one consumer failed.
//! - [`RelayError`]: errors raised by the relay runtime itself (startup, fatal upstream loss, drain).
//!
//! All of them provide `as_label` for logs. Only [`RelayError`] ever leaves the
//! library: parse and sink errors are recovered where they happen.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced while parsing an upstream line.
///
/// Parse failures are logged and the offending line is dropped; the stream goes on.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than four whitespace-separated fields.
    #[error("malformed event {line:?}: expected 4 fields, got {fields}")]
    MissingFields {
        /// The offending line.
        line: String,
        /// Number of fields found.
        fields: usize,
    },

    /// The repeat field is not a 32-bit hexadecimal number.
    #[error("malformed event {line:?}: can't parse hex {repeat:?}")]
    BadRepeat {
        /// The offending line.
        line: String,
        /// The repeat field as received.
        repeat: String,
    },
}

impl ParseError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use lirc_relay::KeyEvent;
    ///
    /// let err = KeyEvent::parse("a 0 KEY_UP").unwrap_err();
    /// assert_eq!(err.as_label(), "malformed_event");
    /// ```
    pub fn as_label(&self) -> &'static str {
        "malformed_event"
    }
}

/// # Errors produced while delivering a line to a single consumer.
///
/// Neither variant affects other consumers or the upstream.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SinkError {
    /// The consumer's queue did not accept the line within the write budget.
    #[error("write timeout after {timeout:?}")]
    Timeout {
        /// The per-write budget that was exceeded.
        timeout: Duration,
    },

    /// The consumer's queue is gone (its writer task already exited).
    #[error("sink closed")]
    Closed,

    /// Writing to the consumer's connection failed.
    #[error("can't write {line:?}: {source}")]
    Write {
        /// The record that failed to go out.
        line: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl SinkError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SinkError::Timeout { .. } => "sink_timeout",
            SinkError::Closed => "sink_closed",
            SinkError::Write { .. } => "sink_write_failure",
        }
    }
}

/// # Errors produced by the relay runtime.
///
/// Startup failures and the loss of the upstream source are fatal; a drain that
/// overruns its grace period is reported but leaves nothing to recover.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RelayError {
    /// Could not connect to the upstream event socket.
    #[error("can't open {path}: {source}")]
    UpstreamConnect {
        /// Upstream socket path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The upstream stream failed or ended; nothing meaningful can be relayed anymore.
    #[error("upstream read failed: {reason}")]
    UpstreamRead {
        /// What went wrong (I/O error text, oversize line, or EOF).
        reason: String,
    },

    /// Could not prepare or bind the downstream listening socket.
    #[error("can't bind {path}: {source}")]
    Bind {
        /// Listening socket path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Could not relax ownership/mode of the listening socket.
    #[error("can't set permissions on {path}: {source}")]
    SocketPermissions {
        /// Listening socket path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Could not install the termination signal handlers.
    #[error("can't listen for signals: {source}")]
    Signals {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Shutdown grace period was exceeded; some stages or connections were still alive.
    #[error("shutdown timeout {grace:?} exceeded; open connections: {connections}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Connections still registered when the grace period ran out.
        connections: usize,
    },
}

impl RelayError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use lirc_relay::RelayError;
    /// use std::time::Duration;
    ///
    /// let err = RelayError::GraceExceeded { grace: Duration::from_secs(1), connections: 2 };
    /// assert_eq!(err.as_label(), "relay_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RelayError::UpstreamConnect { .. } => "relay_upstream_connect",
            RelayError::UpstreamRead { .. } => "relay_upstream_read",
            RelayError::Bind { .. } => "relay_bind",
            RelayError::SocketPermissions { .. } => "relay_socket_permissions",
            RelayError::Signals { .. } => "relay_signals",
            RelayError::GraceExceeded { .. } => "relay_grace_exceeded",
        }
    }

    /// Indicates whether the error should terminate the process with a failure status.
    ///
    /// Everything except [`RelayError::GraceExceeded`] is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RelayError::GraceExceeded { .. })
    }
}
