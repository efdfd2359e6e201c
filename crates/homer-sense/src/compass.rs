use anyhow::Result;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use homer_proto::messages::{parse_compass, CompassPacket};
use homer_proto::{signed_bearing, BearingSample};

use crate::config::CompassConfig;
use crate::{bind, pause_after_error, recv_until, reset_to, Listener, Recv, MAX_DATAGRAM};

pub async fn spawn_compass(cfg: &CompassConfig) -> Result<Listener<BearingSample>> {
    let sock = bind(cfg.bind(), "compass").await?;
    let local_addr = sock.local_addr()?;
    let (tx, rx) = watch::channel(BearingSample::invalid());
    info!("compass: listening on {} (offset {} deg)", local_addr, cfg.offset_deg());
    let task = tokio::spawn(run(sock, tx, cfg.timeout(), cfg.offset_deg()));
    Ok(Listener { rx, local_addr, task })
}

pub fn to_sample(p: &CompassPacket, offset_deg: f64) -> BearingSample {
    let raw = p.bearing.filter(|b| b.is_finite());
    BearingSample {
        raw,
        bearing: raw.map(|r| signed_bearing(r, offset_deg)),
        strength: p.strength,
        confidence: p.confidence,
    }
}

/// A bad datagram leaves the last reading in place; only the deadline,
/// counted from the last good packet, invalidates it.
async fn run(sock: UdpSocket, tx: watch::Sender<BearingSample>, timeout: Duration, offset_deg: f64) {
    let mut buf = [0u8; MAX_DATAGRAM];
    let mut deadline = Instant::now() + timeout;

    while !tx.is_closed() {
        match recv_until(&sock, &mut buf, deadline).await {
            Recv::Packet(n) => match parse_compass(&buf[..n]) {
                Ok(p) => {
                    tx.send_replace(to_sample(&p, offset_deg));
                    deadline = Instant::now() + timeout;
                }
                Err(e) => warn!("compass: dropping packet: {}", e),
            },
            Recv::TimedOut => {
                if reset_to(&tx, BearingSample::invalid()) {
                    info!("compass: silent for {:?}, bearing invalid", timeout);
                }
                deadline = Instant::now() + timeout;
            }
            Recv::Failed(e) => {
                warn!("compass: recv failed: {}", e);
                pause_after_error().await;
            }
        }
    }
    debug!("compass: no readers left, stopping");
}
