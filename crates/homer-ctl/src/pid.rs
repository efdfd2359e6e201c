use std::time::{Duration, Instant};

use homer_proto::ControllerGains;

/// PID over the normalized bearing error, setpoint 0.
///
/// Input is `bearing / 180` so +/-180 deg maps to +/-1. The error is
/// `setpoint - input`, so a target on the right (positive bearing) produces a
/// negative output, which is the clockwise yaw convention of `EffortCommand`.
///
/// Integral and derivative terms use the measured time between calls rather
/// than a nominal sample period; the derivative acts on the measurement to
/// avoid a kick when gains change.
#[derive(Debug, Clone)]
pub struct HeadingController {
    gains: ControllerGains,
    limit: f64,
    scale: f64,
    min_sample: Option<Duration>,

    integral: f64,
    last_input: Option<f64>,
    last_time: Option<Instant>,
    last_output: f64,
}

impl HeadingController {
    pub const SETPOINT: f64 = 0.0;

    pub fn new(gains: ControllerGains, limit: f64, scale: f64) -> Self {
        Self {
            gains,
            limit: limit.abs(),
            scale,
            min_sample: None,
            integral: 0.0,
            last_input: None,
            last_time: None,
            last_output: 0.0,
        }
    }

    /// Calls closer together than `min` return the previous output unchanged.
    pub fn with_min_sample(mut self, min: Option<Duration>) -> Self {
        self.min_sample = min;
        self
    }

    pub fn gains(&self) -> ControllerGains {
        self.gains
    }

    pub fn set_gains(&mut self, gains: ControllerGains) {
        self.gains = gains;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Drops integral and derivative history; gains are kept.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_input = None;
        self.last_time = None;
        self.last_output = 0.0;
    }

    /// Normalized output in `[-limit, limit]`.
    pub fn update(&mut self, bearing_deg: f64, now: Instant) -> f64 {
        let input = bearing_deg / 180.0;
        let dt = self.last_time.map(|t| now.saturating_duration_since(t));

        if let (Some(dt), Some(min)) = (dt, self.min_sample) {
            if dt < min {
                return self.last_output;
            }
        }

        let error = Self::SETPOINT - input;
        let p = self.gains.kp * error;

        let mut d = 0.0;
        if let Some(dt) = dt.map(|d| d.as_secs_f64()).filter(|d| *d > 0.0) {
            self.integral = (self.integral + self.gains.ki * error * dt).clamp(-self.limit, self.limit);
            if let Some(prev) = self.last_input {
                d = -self.gains.kd * (input - prev) / dt;
            }
        }

        let out = (p + self.integral + d).clamp(-self.limit, self.limit);
        self.last_input = Some(input);
        self.last_time = Some(now);
        self.last_output = out;
        out
    }

    /// Output scaled to yaw units.
    pub fn yaw(&mut self, bearing_deg: f64, now: Instant) -> i32 {
        (self.update(bearing_deg, now) * self.scale) as i32
    }
}
