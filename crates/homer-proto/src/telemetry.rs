use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Idle,
    ManualOverride,
    AutonomousHoming,
    AutonomousWaiting,
}

impl Default for ControlMode {
    fn default() -> Self {
        ControlMode::Idle
    }
}

/// Status datagram relayed to the ground station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "telem")]
pub struct TelemetryEvent {
    pub ts_unix_ms: i64,
    pub heartbeat: u64,
    /// Raw receiver angle, as the operator sees it on the direction finder.
    pub bearing: Option<f64>,
    pub arm: bool,
    pub pidparams: [f64; 3],
    /// (pitch, yaw)
    pub effort: [i32; 2],
    pub mode: ControlMode,
    pub link_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_carries_type_tag() {
        let ev = TelemetryEvent {
            ts_unix_ms: 1,
            heartbeat: 42,
            bearing: Some(200.0),
            arm: true,
            pidparams: [0.3, 0.0, 1.0],
            effort: [-200, 15],
            mode: ControlMode::AutonomousHoming,
            link_error: None,
        };
        let v: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "telem");
        assert_eq!(v["heartbeat"], 42);
        assert_eq!(v["mode"], "autonomous_homing");
        assert_eq!(v["effort"][0], -200);
    }
}
