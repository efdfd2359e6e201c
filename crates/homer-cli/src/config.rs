use anyhow::{Context, Result};
use serde::Deserialize;

use homer_ctl::{ControlConfig, PidConfig};
use homer_link::LinkConfig;
use homer_sense::{CommandConfig, CompassConfig, JoystickConfig, VisionConfig};

use crate::telemetry::TelemetryConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub link: LinkConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub pid: PidConfig,
    #[serde(default)]
    pub compass: CompassConfig,
    #[serde(default)]
    pub joystick: JoystickConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub commands: CommandConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

pub fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use homer_link::Backend;

    #[test]
    fn example_config_parses() {
        let cfg: Config = toml::from_str(include_str!("../homer.example.toml")).unwrap();
        assert_eq!(cfg.link.backend, Backend::Mavlink);
        assert_eq!(cfg.compass.offset_deg(), 45.0);
        assert_eq!(cfg.control.forward_speed(), 200);
        assert!(cfg.telemetry.enabled());
    }

    #[test]
    fn only_link_section_is_required() {
        let cfg: Config = toml::from_str("[link]\nbackend = \"json-line\"\nserial_dev = \"/dev/ttyACM0\"").unwrap();
        assert_eq!(cfg.joystick.bind(), "0.0.0.0:5002");
        assert!(!cfg.vision.enabled());
        assert!(toml::from_str::<Config>("[control]\ntick_ms = 50").is_err());
    }
}
