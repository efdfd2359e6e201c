use anyhow::{Context, Result};
use std::net::SocketAddr;

use crate::config::{CommandConfig, CompassConfig, JoystickConfig, VisionConfig};

fn check_bind(what: &str, addr: &str) -> Result<()> {
    addr.parse::<SocketAddr>()
        .with_context(|| format!("{}.bind is not an ip:port address: {}", what, addr))?;
    Ok(())
}

pub fn check_sensors(
    js: &JoystickConfig,
    compass: &CompassConfig,
    vision: &VisionConfig,
    commands: &CommandConfig,
) -> Result<()> {
    check_bind("joystick", js.bind())?;
    check_bind("compass", compass.bind())?;
    check_bind("commands", commands.bind())?;
    anyhow::ensure!(!js.timeout().is_zero(), "joystick.timeout_ms must be positive");
    anyhow::ensure!(!compass.timeout().is_zero(), "compass.timeout_ms must be positive");
    anyhow::ensure!(compass.offset_deg().is_finite(), "compass.offset_deg must be a number");

    if vision.enabled() {
        check_bind("vision", vision.bind())?;
        anyhow::ensure!(!vision.timeout().is_zero(), "vision.timeout_ms must be positive");
    }

    let mut ports = vec![js.bind(), compass.bind(), commands.bind()];
    if vision.enabled() {
        ports.push(vision.bind());
    }
    ports.sort_unstable();
    let before = ports.len();
    ports.dedup();
    anyhow::ensure!(ports.len() == before, "sensor listeners must use distinct bind addresses");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        check_sensors(
            &JoystickConfig::default(),
            &CompassConfig::default(),
            &VisionConfig { enable: Some(true), ..Default::default() },
            &CommandConfig::default(),
        )
        .unwrap();
    }

    #[test]
    fn rejects_bad_or_shared_addresses() {
        let js = JoystickConfig { bind: Some("localhost".into()), ..Default::default() };
        assert!(check_sensors(&js, &CompassConfig::default(), &VisionConfig::default(), &CommandConfig::default()).is_err());

        let cmds = CommandConfig { bind: Some("0.0.0.0:5002".into()) };
        assert!(check_sensors(&JoystickConfig::default(), &CompassConfig::default(), &VisionConfig::default(), &cmds).is_err());
    }
}
