//! # Coalescer: folds lircd repeat bursts into press / hold events.
//!
//! While a key is held lircd emits one line per repeat. The coalescer keeps at
//! most one [`PendingEvent`] and decides, on every input or when its single
//! deadline expires, whether to merge, flush, or flush as `_HOLD`.
//!
//! ## State machine
//! ```text
//!                 fresh (repeat == 0)
//!   ┌──────┐ ─────────────────────────────► ┌─────────┐
//!   │ Idle │                                │ Holding │ ◄─┐ next repeat, < hold_threshold
//!   └──────┘ ◄───────────────────────────── └─────────┘ ──┘ (merge, re-arm quiet timer)
//!      ▲ │      emit pending on:                 │
//!      │ │      - quiet timer (+_HOLD if > hold_threshold since first press)
//!      │ │      - next repeat after hold_threshold (+_HOLD)
//!      │ │      - other key / broken sequence (then admit the new event)
//!      │ └─ repeat (orphan) → discarded
//!      └──────────────────────────────────────────
//! ```
//!
//! ## Rules
//! - Exactly one output per pending event; orphan repeats produce nothing.
//! - Hold detection is anchored on the **first press**, not the last refresh.
//! - Only one deadline exists at a time (`refreshed_at + quiet_period`).
//! - [`Coalescer`] itself is synchronous and takes explicit instants;
//!   [`Coalescer::run`] is the single-owner loop that feeds it input and timer ticks.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::events::KeyEvent;

/// The event currently held back, with its timing.
#[derive(Debug)]
struct PendingEvent {
    event: KeyEvent,
    started_at: Instant,
    refreshed_at: Instant,
}

/// Press/hold state machine.
#[derive(Debug)]
pub struct Coalescer {
    quiet_period: Duration,
    hold_threshold: Duration,
    pending: Option<PendingEvent>,
}

impl Coalescer {
    /// Creates an idle coalescer.
    pub fn new(quiet_period: Duration, hold_threshold: Duration) -> Self {
        Self {
            quiet_period,
            hold_threshold,
            pending: None,
        }
    }

    /// Creates an idle coalescer with the timings from `cfg`.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.quiet_period, cfg.hold_threshold)
    }

    /// True while an event is held back.
    pub fn is_holding(&self) -> bool {
        self.pending.is_some()
    }

    /// When the quiet-period timer fires, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
            .as_ref()
            .map(|p| p.refreshed_at + self.quiet_period)
    }

    /// Applies one input observed at `now`; returns the event to emit, if any.
    pub fn on_event(&mut self, ev: KeyEvent, now: Instant) -> Option<KeyEvent> {
        // Input observed after an overdue deadline: release first, as the timer would have.
        if self.deadline().is_some_and(|d| now >= d) {
            let released = self.on_deadline(now);
            self.admit(ev, now);
            return released;
        }

        let Some(mut pending) = self.pending.take() else {
            self.admit(ev, now);
            return None;
        };

        if pending.event.name != ev.name {
            debug!(pending = %pending.event.name, next = %ev.name, "name differs");
            self.admit(ev, now);
            return Some(pending.event);
        }

        if !pending.event.is_followed_by(&ev) {
            debug!(
                name = %ev.name,
                expected = pending.event.repeat.saturating_add(1),
                got = ev.repeat,
                "repeat sequence broken"
            );
            self.admit(ev, now);
            return Some(pending.event);
        }

        if self.held_past_threshold(&pending, now) {
            pending.event.mark_hold();
            return Some(pending.event);
        }

        pending.event.repeat = ev.repeat;
        pending.refreshed_at = now;
        self.pending = Some(pending);
        None
    }

    /// Handles the quiet-period timer; a no-op before the deadline.
    pub fn on_deadline(&mut self, now: Instant) -> Option<KeyEvent> {
        match self.deadline() {
            Some(d) if now >= d => self.flush(now),
            _ => None,
        }
    }

    /// Releases whatever is pending (shutdown path).
    pub fn flush(&mut self, now: Instant) -> Option<KeyEvent> {
        let pending = self.pending.take()?;
        Some(self.release(pending, now))
    }

    /// Single-owner event loop: multiplexes input and the quiet-period timer.
    ///
    /// Exits when the input closes or `token` is cancelled, flushing the pending
    /// event before dropping `tx`.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<KeyEvent>,
        tx: mpsc::Sender<KeyEvent>,
        token: CancellationToken,
    ) {
        info!("Init coalescer");
        loop {
            let deadline = self.deadline();
            let out = tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(ev) => {
                        let now = ev.observed_at;
                        self.on_event(ev, now)
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_deadline(Instant::now())
                }
            };

            if let Some(ev) = out {
                if tx.send(ev).await.is_err() {
                    info!("Exit coalescer: output closed");
                    return;
                }
            }
        }

        if let Some(ev) = self.flush(Instant::now()) {
            debug!(name = %ev.name, "flush pending on exit");
            let _ = tx.send(ev).await;
        }
        info!("Exit coalescer");
    }

    fn admit(&mut self, ev: KeyEvent, now: Instant) {
        if ev.is_fresh() {
            self.pending = Some(PendingEvent {
                event: ev,
                started_at: now,
                refreshed_at: now,
            });
        } else {
            debug!(name = %ev.name, repeat = ev.repeat, "skip orphan repeat");
        }
    }

    fn release(&self, mut pending: PendingEvent, now: Instant) -> KeyEvent {
        if self.held_past_threshold(&pending, now) {
            pending.event.mark_hold();
        }
        pending.event
    }

    fn held_past_threshold(&self, pending: &PendingEvent, now: Instant) -> bool {
        now.saturating_duration_since(pending.started_at) > self.hold_threshold
    }
}
