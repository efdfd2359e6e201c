use std::time::{Duration, Instant};

/// Dwell timer: fires at most once per `interval`.
///
/// Firing restarts the interval before returning, so two callers can never
/// both observe the same expiry. `reset` restarts the interval without firing.
#[derive(Debug, Clone)]
pub struct PeriodicGate {
    last: Instant,
    interval: Duration,
}

impl PeriodicGate {
    pub fn new(interval: Duration) -> Self {
        Self::new_at(interval, Instant::now())
    }

    pub fn new_at(interval: Duration, now: Instant) -> Self {
        Self { last: now, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn elapsed(&mut self) -> bool {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) < self.interval {
            return false;
        }
        self.last = now;
        true
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, now: Instant) {
        self.last = now;
    }
}
