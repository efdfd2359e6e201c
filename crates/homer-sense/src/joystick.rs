use anyhow::Result;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use homer_proto::messages::parse_joystick;
use homer_proto::JoystickState;

use crate::config::JoystickConfig;
use crate::{bind, pause_after_error, recv_until, reset_to, Listener, Recv, MAX_DATAGRAM};

pub async fn spawn_joystick(cfg: &JoystickConfig) -> Result<Listener<JoystickState>> {
    let sock = bind(cfg.bind(), "joystick").await?;
    let local_addr = sock.local_addr()?;
    let (tx, rx) = watch::channel(JoystickState::neutral());
    info!("joystick: listening on {}", local_addr);
    let task = tokio::spawn(run(sock, tx, cfg.timeout()));
    Ok(Listener { rx, local_addr, task })
}

/// Any gap (timeout, bad datagram, socket error) drops the sticks to neutral.
async fn run(sock: UdpSocket, tx: watch::Sender<JoystickState>, timeout: Duration) {
    let mut buf = [0u8; MAX_DATAGRAM];
    let mut deadline = Instant::now() + timeout;

    while !tx.is_closed() {
        match recv_until(&sock, &mut buf, deadline).await {
            Recv::Packet(n) => match parse_joystick(&buf[..n]) {
                Ok(p) => {
                    tx.send_replace(p.into());
                    deadline = Instant::now() + timeout;
                }
                Err(e) => {
                    warn!("joystick: dropping packet: {}", e);
                    reset_to(&tx, JoystickState::neutral());
                }
            },
            Recv::TimedOut => {
                if reset_to(&tx, JoystickState::neutral()) {
                    info!("joystick: silent for {:?}, sticks neutral", timeout);
                }
                deadline = Instant::now() + timeout;
            }
            Recv::Failed(e) => {
                warn!("joystick: recv failed: {}", e);
                reset_to(&tx, JoystickState::neutral());
                pause_after_error().await;
            }
        }
    }
    debug!("joystick: no readers left, stopping");
}
