//! Relay core: the coalescing pipeline and consumer fan-out.
//!
//! The only public entry point from this module is [`Relay`], which wires the
//! stages together and drives shutdown. The building blocks are exported for
//! embedding and testing.
//!
//! Internal modules:
//! - [`coalescer`]: press/hold state machine and its single-owner loop;
//! - [`stages`]: upstream reader, parser and formatter tasks;
//! - [`registry`]: copy-on-write set of consumer sinks;
//! - [`broadcaster`]: bounded-time fan-out over the registry;
//! - [`connection`]: per-consumer writer task;
//! - [`listener`]: downstream socket setup and accept loop;
//! - [`shutdown`]: OS signal handling;
//! - [`relay`]: wiring, fatal-error handling and graceful drain.

mod broadcaster;
mod coalescer;
mod connection;
mod listener;
mod registry;
mod relay;
mod shutdown;
mod stages;

pub use broadcaster::{Broadcaster, Delivery};
pub use coalescer::Coalescer;
pub use registry::{Registry, Sink, SinkId};
pub use relay::Relay;
pub use shutdown::ShutdownSignals;
