pub mod autodetect;
pub mod doctor;
pub mod error;
pub mod handshake;
pub mod jsonline;
pub mod mav;
pub mod state;
pub mod transport;
pub mod worker;

pub use error::LinkError;
pub use handshake::{HandshakePolicy, Link, VehicleLink};
pub use state::LinkStatus;
pub use transport::{Inbound, Severity, Transport};
pub use worker::{spawn_link_worker, LinkHandle, LinkRequest};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::jsonline::JsonLineTransport;
use crate::mav::{MavIds, MavTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// ArduPilot-style autopilot over MAVLink.
    Mavlink,
    /// Motor-controller board speaking newline-framed JSON.
    JsonLine,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    pub backend: Backend,

    /// Probe candidate serial ports/bauds for a MAVLink HEARTBEAT instead of
    /// using `serial_dev`/`baud`. MAVLink backend only.
    pub autodetect: Option<bool>,

    pub serial_dev: Option<String>,
    pub baud: Option<u32>,

    pub candidate_devs: Option<Vec<String>>,
    pub candidate_bauds: Option<Vec<u32>>,

    /// Wait for the first autopilot heartbeat (and per autodetect probe).
    pub heartbeat_timeout_ms: Option<u64>,

    /// MAVLink ids (ours, then the autopilot's).
    pub sys_id: Option<u8>,
    pub comp_id: Option<u8>,
    pub target_sys: Option<u8>,
    pub target_comp: Option<u8>,

    /// Autopilot custom mode selected on connect. Default 0 (ArduRover MANUAL).
    pub manual_mode: Option<u32>,

    /// JSON-line `sender`/`target` stamps.
    pub sender_id: Option<String>,
    pub target_id: Option<String>,

    /// Reply window per handshake attempt. Default 3s.
    pub ack_timeout_ms: Option<u64>,

    /// Handshake attempts before giving up; 0 retries forever. Default 5.
    pub handshake_attempts: Option<u32>,

    /// Worker read timeout between queued requests. Default 20ms.
    pub poll_ms: Option<u64>,
}

impl LinkConfig {
    pub fn autodetect(&self) -> bool {
        self.autodetect.unwrap_or(false)
    }

    pub fn baud(&self) -> u32 {
        self.baud.unwrap_or(115200)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms.unwrap_or(5000))
    }

    pub fn mav_ids(&self) -> MavIds {
        let d = MavIds::default();
        MavIds {
            sys_id: self.sys_id.unwrap_or(d.sys_id),
            comp_id: self.comp_id.unwrap_or(d.comp_id),
            target_sys: self.target_sys.unwrap_or(d.target_sys),
            target_comp: self.target_comp.unwrap_or(d.target_comp),
        }
    }

    pub fn policy(&self) -> HandshakePolicy {
        HandshakePolicy {
            max_attempts: match self.handshake_attempts.unwrap_or(5) {
                0 => None,
                n => Some(n),
            },
            ack_timeout: Duration::from_millis(self.ack_timeout_ms.unwrap_or(3000)),
        }
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.unwrap_or(20))
    }

    pub fn sender_id(&self) -> &str {
        self.sender_id.as_deref().unwrap_or("homer")
    }

    pub fn target_id(&self) -> &str {
        self.target_id.as_deref().unwrap_or("nucleo")
    }
}

/// An opened link plus where it was found.
pub struct OpenedLink {
    pub link: Box<dyn VehicleLink>,
    pub port: String,
    pub baud: u32,
}

fn resolve_port(cfg: &LinkConfig) -> Result<(String, u32)> {
    if cfg.backend == Backend::Mavlink && cfg.autodetect() {
        let devs = cfg.candidate_devs.clone().unwrap_or_else(autodetect::default_candidate_devs);
        let bauds = cfg.candidate_bauds.clone().unwrap_or_else(autodetect::default_candidate_bauds);
        let res = autodetect::autodetect_autopilot(&devs, &bauds, cfg.heartbeat_timeout(), cfg.mav_ids())?;
        return res.chosen.context("link autodetect: no autopilot heartbeat on any candidate");
    }
    let dev = cfg.serial_dev.clone().context("link.serial_dev required when autodetect is off")?;
    Ok((dev, cfg.baud()))
}

/// Opens the configured backend. Blocking: call from a blocking context.
pub fn open_link(cfg: &LinkConfig) -> Result<OpenedLink> {
    let (port, baud) = resolve_port(cfg)?;
    let policy = cfg.policy();

    let link: Box<dyn VehicleLink> = match cfg.backend {
        Backend::Mavlink => {
            let mut t = MavTransport::open(&port, baud, cfg.mav_ids())?;
            if !t.wait_heartbeat(cfg.heartbeat_timeout())? {
                anyhow::bail!("no autopilot heartbeat on {} @ {}", port, baud);
            }
            let mode = cfg.manual_mode.unwrap_or(0);
            if !t.set_mode(mode, policy.ack_timeout)? {
                warn!("link: autopilot did not confirm mode {}", mode);
            }
            Box::new(Link::new(t, policy))
        }
        Backend::JsonLine => {
            let t = JsonLineTransport::open(&port, baud, cfg.sender_id(), cfg.target_id())?;
            Box::new(Link::new(t, policy))
        }
    };

    info!("link: {} open on {} @ {}", link.backend(), port, baud);
    Ok(OpenedLink { link, port, baud })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_and_defaults() {
        let cfg: LinkConfig = toml::from_str(
            r#"
            backend = "json-line"
            serial_dev = "/dev/ttyACM0"
            handshake_attempts = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.backend, Backend::JsonLine);
        assert_eq!(cfg.baud(), 115200);
        assert_eq!(cfg.policy().max_attempts, None);
        assert_eq!(cfg.policy().ack_timeout, Duration::from_secs(3));
        assert_eq!(cfg.sender_id(), "homer");
        assert_eq!(resolve_port(&cfg).unwrap(), ("/dev/ttyACM0".to_string(), 115200));
    }

    #[test]
    fn missing_device_is_an_error() {
        let cfg: LinkConfig = toml::from_str(r#"backend = "mavlink""#).unwrap();
        assert_eq!(cfg.policy().max_attempts, Some(5));
        assert!(resolve_port(&cfg).is_err());
    }
}
