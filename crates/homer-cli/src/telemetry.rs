use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use homer_link::{LinkHandle, LinkStatus};
use homer_proto::telemetry::{ControlMode, TelemetryEvent};
use homer_proto::{ControllerGains, EffortCommand};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    pub enable: Option<bool>,
    /// Ground relay address. Default 127.0.0.1:5000.
    pub target: Option<String>,
    /// Default 1s.
    pub interval_ms: Option<u64>,
}

impl TelemetryConfig {
    pub fn enabled(&self) -> bool {
        self.enable.unwrap_or(true)
    }

    pub fn target(&self) -> &str {
        self.target.as_deref().unwrap_or("127.0.0.1:5000")
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.unwrap_or(1000).max(100))
    }
}

/// What the control loop last decided, published once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlReport {
    pub mode: ControlMode,
    pub effort: EffortCommand,
    pub gains: ControllerGains,
    pub raw_bearing: Option<f64>,
}

pub fn build_event(report: &ControlReport, link: &LinkStatus, now: OffsetDateTime) -> TelemetryEvent {
    TelemetryEvent {
        ts_unix_ms: (now.unix_timestamp_nanos() / 1_000_000) as i64,
        heartbeat: link.heartbeat,
        bearing: report.raw_bearing,
        arm: link.armed,
        pidparams: report.gains.as_array(),
        effort: [report.effort.pitch, report.effort.yaw],
        mode: report.mode,
        link_error: link.last_error.clone(),
    }
}

pub struct TelemetryRelay {
    sock: UdpSocket,
    target: String,
}

impl TelemetryRelay {
    pub async fn bind(target: &str) -> Result<Self> {
        let sock = UdpSocket::bind("0.0.0.0:0").await.context("bind telemetry socket")?;
        Ok(Self { sock, target: target.to_string() })
    }

    pub async fn send(&self, ev: &TelemetryEvent) -> Result<()> {
        let mut line = serde_json::to_string(ev).context("encode telemetry")?;
        line.push('\n');
        self.sock
            .send_to(line.as_bytes(), self.target.as_str())
            .await
            .with_context(|| format!("send telemetry to {}", self.target))?;
        Ok(())
    }

    /// Sends one event per interval until the report channel closes.
    pub async fn run(self, interval: Duration, mut reports: watch::Receiver<ControlReport>, link: LinkHandle) {
        info!("telemetry: relaying to {} every {:?}", self.target, interval);
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if reports.has_changed().is_err() {
                debug!("telemetry: control loop gone, stopping");
                return;
            }
            let report = *reports.borrow_and_update();
            let ev = build_event(&report, &link.status(), OffsetDateTime::now_utc());
            if let Err(e) = self.send(&ev).await {
                warn!("telemetry: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn event_combines_control_and_link_state() {
        let report = ControlReport {
            mode: ControlMode::AutonomousHoming,
            effort: EffortCommand::new(-200, -45),
            gains: ControllerGains::default(),
            raw_bearing: Some(52.0),
        };
        let link = LinkStatus { armed: true, heartbeat: 42, ..Default::default() };
        let ev = build_event(&report, &link, datetime!(2024-05-01 12:00:00 UTC));

        assert_eq!(ev.ts_unix_ms, 1_714_564_800_000);
        assert_eq!(ev.heartbeat, 42);
        assert!(ev.arm);
        assert_eq!(ev.pidparams, [0.3, 0.0, 1.0]);
        assert_eq!(ev.effort, [-200, -45]);
        assert_eq!(ev.bearing, Some(52.0));
        assert_eq!(ev.link_error, None);
    }

    #[tokio::test]
    async fn relay_sends_json_datagrams() {
        let ground = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay = TelemetryRelay::bind(&ground.local_addr().unwrap().to_string()).await.unwrap();
        let ev = build_event(&ControlReport::default(), &LinkStatus::default(), OffsetDateTime::UNIX_EPOCH);
        relay.send(&ev).await.unwrap();

        let mut buf = [0u8; 1024];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), ground.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(v["type"], "telem");
        assert_eq!(v["mode"], "idle");
        assert_eq!(v["effort"], serde_json::json!([0, 0]));
    }
}
