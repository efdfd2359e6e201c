use serde::Deserialize;
use std::time::Duration;

use homer_proto::ValidityThresholds;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoystickConfig {
    /// UDP address for `js` packets. Default 0.0.0.0:5002.
    pub bind: Option<String>,
    /// Silence after which the sticks read neutral. Default 1s.
    pub timeout_ms: Option<u64>,
}

impl JoystickConfig {
    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or("0.0.0.0:5002")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(1000))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompassConfig {
    /// UDP address the direction finder sends to. Default 127.0.0.1:5001.
    pub bind: Option<String>,
    /// Silence after which the bearing is invalid. Default 10s.
    pub timeout_ms: Option<u64>,
    /// Antenna mounting offset subtracted from the raw angle, degrees.
    pub offset_deg: Option<f64>,
    /// Startup validity gates; the operator may change them at runtime.
    pub min_strength: Option<f64>,
    pub min_confidence: Option<f64>,
}

impl CompassConfig {
    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or("127.0.0.1:5001")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(10_000))
    }

    pub fn offset_deg(&self) -> f64 {
        self.offset_deg.unwrap_or(0.0)
    }

    pub fn thresholds(&self) -> ValidityThresholds {
        let d = ValidityThresholds::default();
        ValidityThresholds {
            min_strength: self.min_strength.unwrap_or(d.min_strength),
            min_confidence: self.min_confidence.unwrap_or(d.min_confidence),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisionConfig {
    pub enable: Option<bool>,
    /// Default 127.0.0.1:5003.
    pub bind: Option<String>,
    /// Default 10s.
    pub timeout_ms: Option<u64>,
}

impl VisionConfig {
    pub fn enabled(&self) -> bool {
        self.enable.unwrap_or(false)
    }

    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or("127.0.0.1:5003")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(10_000))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandConfig {
    /// UDP address for operator `cmd` packets. Default 0.0.0.0:5004.
    pub bind: Option<String>,
}

impl CommandConfig {
    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or("0.0.0.0:5004")
    }
}
