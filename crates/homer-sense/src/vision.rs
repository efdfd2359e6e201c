use anyhow::Result;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use homer_proto::messages::{parse_ground, GroundPacket};
use homer_proto::VisionSample;

use crate::config::VisionConfig;
use crate::{bind, pause_after_error, recv_until, reset_to, Listener, Recv, MAX_DATAGRAM};

pub async fn spawn_vision(cfg: &VisionConfig) -> Result<Listener<VisionSample>> {
    let sock = bind(cfg.bind(), "vision").await?;
    let local_addr = sock.local_addr()?;
    let (tx, rx) = watch::channel(VisionSample::default());
    info!("vision: listening on {}", local_addr);
    let task = tokio::spawn(run(sock, tx, cfg.timeout()));
    Ok(Listener { rx, local_addr, task })
}

async fn run(sock: UdpSocket, tx: watch::Sender<VisionSample>, timeout: Duration) {
    let mut buf = [0u8; MAX_DATAGRAM];
    let mut deadline = Instant::now() + timeout;

    while !tx.is_closed() {
        match recv_until(&sock, &mut buf, deadline).await {
            Recv::Packet(n) => match parse_ground(&buf[..n]) {
                Ok(GroundPacket::Vision(p)) => {
                    tx.send_replace(p.into());
                    deadline = Instant::now() + timeout;
                }
                Ok(other) => debug!("vision: ignoring {:?}", other),
                Err(e) => warn!("vision: dropping packet: {}", e),
            },
            Recv::TimedOut => {
                if reset_to(&tx, VisionSample::default()) {
                    info!("vision: silent for {:?}, no reading", timeout);
                }
                deadline = Instant::now() + timeout;
            }
            Recv::Failed(e) => {
                warn!("vision: recv failed: {}", e);
                pause_after_error().await;
            }
        }
    }
    debug!("vision: no readers left, stopping");
}
