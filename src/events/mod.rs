//! Key events: data model, parsing and wire rendering.
//!
//! ## Contents
//! - [`KeyEvent`] one upstream key activation, parsed from `id repeatHex name device`
//! - [`to_line`] renders a coalesced event as `id 0 name device`
//!
//! Parsing and rendering are pure; the pipeline stages that drive them live in
//! `core/stages.rs`.

mod event;
mod format;

pub use event::{HOLD_SUFFIX, KeyEvent};
pub use format::to_line;
