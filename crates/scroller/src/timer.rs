//! Scroll settle detection and the navigation broadcast guard.
//!
//! Pure state with no clock of its own: the host passes `now` in on every
//! call, which keeps the whole thing deterministic under test.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerState {
    Idle,
    /// Scroll activity seen; the sampler is comparing offsets.
    Sampling,
    /// Sampling has stopped but a navigation broadcast is still due.
    PendingBroadcast,
}

/// Result of a due sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sample {
    /// The offset moved since the previous sample; keep sampling.
    Moving,
    /// The offset hasn't moved for a whole interval. Sampling has stopped.
    Settled,
}

#[derive(Debug, Clone, Copy)]
struct Sampler {
    last_offset: f64,
    due: Instant,
}

#[derive(Debug)]
pub(crate) struct SettleTimer {
    interval: Duration,
    broadcast_delay: Duration,
    sampler: Option<Sampler>,
    broadcast_due: Option<Instant>,
    /// The guard already fired while the current cycle was still moving.
    broadcast_spent: bool,
}

impl SettleTimer {
    pub(crate) fn new(interval: Duration, broadcast_delay: Duration) -> Self {
        Self { interval, broadcast_delay, sampler: None, broadcast_due: None, broadcast_spent: false }
    }

    pub(crate) fn state(&self) -> TimerState {
        match (self.sampler, self.broadcast_due) {
            (Some(_), _) => TimerState::Sampling,
            (None, Some(_)) => TimerState::PendingBroadcast,
            (None, None) => TimerState::Idle,
        }
    }

    /// Record a raw scroll event at `offset`.
    ///
    /// Starts the sampler if it isn't running and arms the broadcast guard
    /// if it isn't armed. Neither is pushed back by further events, and the
    /// guard is not re-armed until the cycle that spent it has settled.
    pub(crate) fn on_scroll(&mut self, now: Instant, offset: f64) {
        if self.sampler.is_none() {
            self.sampler = Some(Sampler { last_offset: offset, due: now + self.interval });
        }
        if self.broadcast_due.is_none() && !self.broadcast_spent {
            self.broadcast_due = Some(now + self.broadcast_delay);
        }
    }

    /// Take a sample if one is due. `None` means nothing was due.
    pub(crate) fn sample(&mut self, now: Instant, offset: f64) -> Option<Sample> {
        let sampler = self.sampler.as_mut()?;
        if now < sampler.due {
            return None;
        }
        if offset - sampler.last_offset == 0.0 {
            self.sampler = None;
            self.broadcast_spent = false;
            return Some(Sample::Settled);
        }
        sampler.last_offset = offset;
        sampler.due = now + self.interval;
        Some(Sample::Moving)
    }

    /// Returns `true` exactly once per armed guard, when it expires.
    pub(crate) fn take_broadcast(&mut self, now: Instant) -> bool {
        match self.broadcast_due {
            Some(due) if now >= due => {
                self.broadcast_due = None;
                self.broadcast_spent = self.sampler.is_some();
                true
            },
            _ => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.sampler = None;
        self.broadcast_due = None;
        self.broadcast_spent = false;
    }
}
