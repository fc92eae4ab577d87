//! Wire rendering of coalesced events.
//!
//! The repeat field is always `0`: consumers see one record per press or hold,
//! however many upstream repeats were folded into it.

use super::KeyEvent;

/// Renders `id 0 name device`.
pub fn to_line(ev: &KeyEvent) -> String {
    format!("{} 0 {} {}", ev.id, ev.name, ev.device)
}
