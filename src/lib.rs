//! # lirc-relay
//!
//! **lirc-relay** sits between `lircd` and any number of local consumers. It
//! folds the burst of repeat notifications a held remote-control key produces
//! into one clean event (a press, or a `_HOLD` when the key stays down), and
//! republishes that stream to every connected client without letting a stalled
//! client slow anyone else down.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   lircd socket
//!        │ bytes
//!        ▼
//! ┌───────────────┐  [String]  ┌────────┐ [KeyEvent] ┌────────────────────────┐
//! │ read_upstream │──────────► │ parse  │──────────► │ Coalescer (event loop) │
//! │ (LinesCodec)  │            └────────┘            │ input ⊕ quiet timer    │
//! └──────┬────────┘                                  └───────────┬────────────┘
//!        │ fatal RelayError                                      │ [KeyEvent]
//!        ▼                                                       ▼
//!   Relay::run ◄── shutdown request                        ┌──────────┐
//!   (cancel + drain within grace)                         │ format   │
//!                                                         └────┬─────┘
//!                                                              │ [String]
//!                                                              ▼
//!                                                     ┌─────────────────┐
//!                                                     │   Broadcaster   │
//!                                                     │ (timeout/push)  │
//!                                                     └───┬────┬────┬───┘
//!                                          Registry snapshot  │    │    │
//!                                                  ┌──────────┘    │    └──────────┐
//!                                                  ▼               ▼               ▼
//!                                             [queue C1]      [queue C2]  ...  [queue CN]
//!                                                  │               │               │
//!                                              writer C1       writer C2       writer CN
//!                                                  ▼               ▼               ▼
//!                                              consumer        consumer        consumer
//! ```
//! Every arrow between stages is a bounded queue (default capacity 2), so
//! backpressure shows up instead of piling up.
//!
//! ### Coalescing
//! ```text
//! id 00 KEY_UP dev ─┐
//! id 01 KEY_UP dev  │ repeats < 500ms after the first press, then 100ms quiet
//! id 02 KEY_UP dev ─┘ ─────────────────────────────────────► id 0 KEY_UP dev
//!
//! id 00 KEY_UP dev ─┐
//! ...               │ repeats still arriving 500ms after the first press
//! id 1a KEY_UP dev ─┘ ─────────────────────────────────────► id 0 KEY_UP_HOLD dev
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                          |
//! |-------------------|--------------------------------------------------------------|------------------------------------|
//! | **Events**        | Parse upstream lines, render normalized output lines.        | [`KeyEvent`], [`to_line`]          |
//! | **Coalescing**    | Press/hold state machine with a single quiet-period timer.   | [`Coalescer`]                      |
//! | **Fan-out**       | Copy-on-write consumer set, bounded-time broadcast.          | [`Registry`], [`Broadcaster`]      |
//! | **Runtime**       | Stage wiring, fatal upstream handling, graceful drain.       | [`Relay`]                          |
//! | **Errors**        | Typed errors with stable labels.                             | [`RelayError`], [`ParseError`], [`SinkError`] |
//! | **Configuration** | Endpoints, timings, queue sizes, socket permissions.         | [`Config`]                         |
//!
//! ## Example
//! ```no_run
//! use lirc_relay::{Config, Relay};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.output_path = "/run/lirc/lircd-relay".into();
//!
//!     let upstream = Relay::connect(&cfg).await?;
//!     let relay = Relay::bind(cfg)?;
//!     relay
//!         .run(upstream, async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{
    Broadcaster, Coalescer, Delivery, Registry, Relay, ShutdownSignals, Sink, SinkId,
};
pub use error::{ParseError, RelayError, SinkError};
pub use events::{HOLD_SUFFIX, KeyEvent, to_line};
