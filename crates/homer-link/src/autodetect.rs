use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::mav::{MavIds, MavTransport};

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub dev: String,
    pub baud: u32,
    pub hb_seen: bool,
    pub elapsed_ms: u64,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct AutodetectResult {
    pub chosen: Option<(String, u32)>,
    pub probes: Vec<ProbeResult>,
}

pub fn default_candidate_devs() -> Vec<String> {
    vec![
        "/dev/serial0".into(),
        "/dev/ttyAMA0".into(),
        "/dev/ttyUSB0".into(),
        "/dev/ttyUSB1".into(),
        "/dev/ttyACM0".into(),
        "/dev/ttyACM1".into(),
    ]
}

pub fn default_candidate_bauds() -> Vec<u32> {
    vec![115200, 57600, 921600]
}

/// Picks the first device/baud pair that yields an autopilot HEARTBEAT.
pub fn autodetect_autopilot(
    candidate_devs: &[String],
    candidate_bauds: &[u32],
    heartbeat_timeout: Duration,
    ids: MavIds,
) -> Result<AutodetectResult> {
    let mut probes = Vec::new();

    for dev in candidate_devs {
        for &baud in candidate_bauds {
            let start = Instant::now();
            let (hb_seen, note) = match MavTransport::open(dev, baud, ids) {
                Ok(mut t) => match t.wait_heartbeat(heartbeat_timeout) {
                    Ok(true) => (true, "heartbeat".to_string()),
                    Ok(false) => (false, "no heartbeat".to_string()),
                    Err(e) => (false, format!("reader failed: {}", e)),
                },
                Err(e) => {
                    warn!("link autodetect: probe failed dev={} baud={} err={:#}", dev, baud, e);
                    (false, format!("open/connect failed: {:#}", e))
                }
            };

            probes.push(ProbeResult {
                dev: dev.clone(),
                baud,
                hb_seen,
                elapsed_ms: start.elapsed().as_millis() as u64,
                note,
            });

            if hb_seen {
                info!("link autodetect: OK {} @ {}", dev, baud);
                return Ok(AutodetectResult { chosen: Some((dev.clone(), baud)), probes });
            }
        }
    }

    Ok(AutodetectResult { chosen: None, probes })
}
