//! Host tick pacing.
//!
//! [`TickTimer`] paces the control loop at a fixed period on the monotonic
//! clock and reports the measured interval since the previous tick, already
//! clamped with [`clamp_dt`].  When a tick overruns by one or more whole
//! periods the missed deadlines are skipped rather than replayed, so ticks
//! never stack up.

use std::time::{Duration, Instant};

use crate::control::clamp_dt;

/// Result of waiting for the next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Clamped seconds since the previous tick.
    pub dt: f32,
    /// Deadlines dropped because the caller overran.
    pub skipped: u32,
}

pub struct TickTimer {
    period: Duration,
    max_dt: f32,
    next: Instant,
    last: Instant,
}

impl TickTimer {
    pub fn new(period: Duration, max_dt: f32) -> Self {
        Self::starting_at(Instant::now(), period, max_dt)
    }

    pub fn starting_at(now: Instant, period: Duration, max_dt: f32) -> Self {
        Self {
            period,
            max_dt,
            next: now + period,
            last: now,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep until the next deadline and return the tick.
    pub fn wait(&mut self) -> Tick {
        let now = Instant::now();
        if let Some(remaining) = self.next.checked_duration_since(now) {
            std::thread::sleep(remaining);
        }
        self.advance(Instant::now())
    }

    /// Account for a tick observed at `now` and schedule the next deadline.
    pub fn advance(&mut self, now: Instant) -> Tick {
        let mut skipped = 0;
        let mut next = self.next + self.period;
        while next <= now {
            next += self.period;
            skipped += 1;
        }
        if skipped > 0 {
            log::debug!("tick overrun: skipped {skipped} period(s)");
        }
        self.next = next;

        let dt = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;
        Tick {
            dt: clamp_dt(dt, self.max_dt),
            skipped,
        }
    }
}
