use serde::Deserialize;
use std::time::Duration;

use homer_proto::ControllerGains;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlConfig {
    /// Control loop period. Default 100ms.
    pub tick_ms: Option<u64>,

    /// Half-width of the "aimed" band around bearing 0, degrees. Default 10.
    pub setpoint_tolerance_deg: Option<f64>,

    /// Dwell inside the band before forward thrust is committed. Default 3s.
    pub setpoint_reached_wait_s: Option<f64>,

    /// Forward thrust magnitude once aimed (max 1000). Default 200.
    pub forward_speed: Option<i32>,

    /// Fixed turn magnitude while outside the band. Default 300.
    pub yaw_speed: Option<i32>,

    /// Below this vision range (m), forward thrust scales down with distance.
    pub near_field_m: Option<f64>,

    /// Allow arming/disarming from joystick buttons while override is held.
    /// Default off.
    pub joystick_arming: Option<bool>,
}

impl ControlConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.unwrap_or(100))
    }

    pub fn tolerance_deg(&self) -> f64 {
        self.setpoint_tolerance_deg.unwrap_or(10.0)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_secs_f64(self.setpoint_reached_wait_s.unwrap_or(3.0).max(0.0))
    }

    pub fn forward_speed(&self) -> i32 {
        self.forward_speed.unwrap_or(200)
    }

    pub fn yaw_speed(&self) -> i32 {
        self.yaw_speed.unwrap_or(300)
    }

    pub fn joystick_arming(&self) -> bool {
        self.joystick_arming.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PidConfig {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,

    /// Symmetric output clamp before scaling. Default 1.0.
    pub output_limit: Option<f64>,

    /// Output to yaw units. Default 1000.
    pub output_scale: Option<f64>,

    /// Optional lower bound on the interval between controller updates.
    pub min_sample_ms: Option<u64>,
}

impl PidConfig {
    pub fn gains(&self) -> ControllerGains {
        let d = ControllerGains::default();
        ControllerGains {
            kp: self.kp.unwrap_or(d.kp),
            ki: self.ki.unwrap_or(d.ki),
            kd: self.kd.unwrap_or(d.kd),
        }
    }

    pub fn output_limit(&self) -> f64 {
        self.output_limit.unwrap_or(1.0)
    }

    pub fn output_scale(&self) -> f64 {
        self.output_scale.unwrap_or(1000.0)
    }

    pub fn min_sample(&self) -> Option<Duration> {
        self.min_sample_ms.map(Duration::from_millis)
    }
}
