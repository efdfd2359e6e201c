use std::time::{Duration, Instant};

/// Snapshot of the vehicle link, written by the link worker and read by the
/// control loop and telemetry.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus {
    pub connected: bool,
    pub backend: Option<&'static str>,
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub armed: bool,
    pub heartbeat: u64,
    pub last_heartbeat: Option<Instant>,
    /// An arm/disarm request is queued or in progress.
    pub handshake_pending: bool,
    pub failed_handshakes: u64,
    pub last_error: Option<String>,
}

impl LinkStatus {
    pub fn hb_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }

    /// Records a new heartbeat count, stamping the time when it advanced.
    pub fn observe_heartbeat(&mut self, heartbeat: u64, now: Instant) {
        if heartbeat != self.heartbeat {
            self.heartbeat = heartbeat;
            self.last_heartbeat = Some(now);
        }
    }
}
