//! Roll scheduler for Bankroll.
//!
//! Every room owns exactly one [`RollScheduler`]. It holds a single timer
//! slot: arming replaces whatever was pending, so a room can never have
//! two timers racing each other. The scheduler does not know anything
//! about dice or pots; it only tells the room actor *which* timer fired.
//!
//! # Integration
//!
//! The scheduler sits inside the room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         biased;
//!         cmd = cmd_rx.recv() => { /* join, bank, start ... */ }
//!         fired = scheduler.wait() => match fired.kind {
//!             TimerKind::Roll => { /* roll the dice */ }
//!             TimerKind::NextRound => { /* begin the next round */ }
//!         }
//!     }
//! }
//! ```
//!
//! [`RollScheduler::wait`] is cancel-safe: dropping the future before it
//! resolves leaves the armed deadline untouched, so losing a `select!`
//! race to a command never loses a roll.

use std::time::Duration;

use tokio::time::{self, Instant as TokioInstant};
use tracing::{trace, warn};

// ---------------------------------------------------------------------------
// Timer kinds
// ---------------------------------------------------------------------------

/// What the armed timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Next automatic roll of the current round.
    Roll,
    /// End of the pause between two rounds.
    NextRound,
}

/// A timer that has just fired, returned by [`RollScheduler::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub kind: TimerKind,
    /// Sequence number handed out by the [`arm`](RollScheduler::arm) call
    /// that scheduled this fire.
    pub seq: u64,
    /// How far past the deadline the fire was observed.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters for one scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerMetrics {
    /// Timers that reached their deadline and were delivered.
    pub total_fired: u64,
    /// Pending timers cleared by [`RollScheduler::cancel`].
    pub total_cancelled: u64,
    /// Pending timers replaced by a new [`RollScheduler::arm`].
    pub total_rearmed: u64,
    /// Fires observed more than 10% of their delay after the deadline.
    pub total_late: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: TimerKind,
    deadline: TokioInstant,
    delay: Duration,
    seq: u64,
}

/// Single-slot, re-armable timer for one room.
#[derive(Debug, Default)]
pub struct RollScheduler {
    pending: Option<Pending>,
    next_seq: u64,
    metrics: TimerMetrics,
}

impl RollScheduler {
    /// Creates a scheduler with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the slot to fire `kind` after `delay`, replacing any pending
    /// timer. Returns the sequence number of the new timer.
    pub fn arm(&mut self, kind: TimerKind, delay: Duration) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;

        if let Some(old) = self.pending.take() {
            self.metrics.total_rearmed += 1;
            trace!(old_kind = ?old.kind, old_seq = old.seq, "replacing pending timer");
        }

        self.pending = Some(Pending {
            kind,
            deadline: TokioInstant::now() + delay,
            delay,
            seq,
        });
        trace!(?kind, seq, delay_ms = delay.as_millis() as u64, "timer armed");
        seq
    }

    /// Clears the slot. Returns `true` if something was pending.
    ///
    /// Idempotent: cancelling an empty slot does nothing.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(old) => {
                self.metrics.total_cancelled += 1;
                trace!(kind = ?old.kind, seq = old.seq, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Waits for the armed timer to fire and clears the slot.
    ///
    /// Pends forever when nothing is armed; `tokio::select!` keeps serving
    /// its other branches in the meantime.
    pub async fn wait(&mut self) -> Fired {
        let Some(Pending { deadline, .. }) = self.pending else {
            return std::future::pending::<Fired>().await;
        };

        time::sleep_until(deadline).await;

        // Nothing is mutated before this point, which keeps the future
        // cancel-safe.
        let Some(fired) = self.pending.take() else {
            return std::future::pending::<Fired>().await;
        };

        let late_by = TokioInstant::now().saturating_duration_since(fired.deadline);
        if !late_by.is_zero() && late_by > fired.delay / 10 {
            self.metrics.total_late += 1;
            warn!(
                kind = ?fired.kind,
                seq = fired.seq,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "timer fired late"
            );
        }
        self.metrics.total_fired += 1;
        trace!(kind = ?fired.kind, seq = fired.seq, "timer fired");

        Fired {
            kind: fired.kind,
            seq: fired.seq,
            late_by,
        }
    }

    /// Whether a timer is pending.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// The kind of the pending timer, if any.
    pub fn armed_kind(&self) -> Option<TimerKind> {
        self.pending.map(|p| p.kind)
    }

    /// Time left until the pending timer fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.pending
            .map(|p| p.deadline.saturating_duration_since(TokioInstant::now()))
    }

    /// Snapshot of the counters.
    pub fn metrics(&self) -> &TimerMetrics {
        &self.metrics
    }
}
