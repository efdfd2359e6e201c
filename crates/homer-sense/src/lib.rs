//! Sensor acquisition: one UDP listener per source, each publishing its
//! latest value into a `watch` slot. A listener that hears nothing before its
//! deadline overwrites its slot with the safe default, so silence reads as
//! "no signal" rather than "old signal".

pub mod commands;
pub mod compass;
pub mod config;
pub mod doctor;
pub mod joystick;
pub mod vision;

pub use commands::{apply_command, spawn_commands};
pub use compass::spawn_compass;
pub use config::{CommandConfig, CompassConfig, JoystickConfig, VisionConfig};
pub use joystick::spawn_joystick;
pub use vision::spawn_vision;

use anyhow::{Context, Result};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

const MAX_DATAGRAM: usize = 2048;

/// A running listener: its latest-value slot and where it is bound.
pub struct Listener<T> {
    pub rx: watch::Receiver<T>,
    pub local_addr: SocketAddr,
    pub task: JoinHandle<()>,
}

pub(crate) async fn bind(addr: &str, what: &str) -> Result<UdpSocket> {
    UdpSocket::bind(addr)
        .await
        .with_context(|| format!("bind {} socket {}", what, addr))
}

pub(crate) enum Recv {
    Packet(usize),
    TimedOut,
    Failed(io::Error),
}

pub(crate) async fn recv_until(sock: &UdpSocket, buf: &mut [u8], deadline: Instant) -> Recv {
    match timeout_at(deadline, sock.recv_from(buf)).await {
        Ok(Ok((n, _))) => Recv::Packet(n),
        Ok(Err(e)) => Recv::Failed(e),
        Err(_) => Recv::TimedOut,
    }
}

/// Overwrites the slot with `safe`; true if it held something else.
pub(crate) fn reset_to<T: PartialEq>(tx: &watch::Sender<T>, safe: T) -> bool {
    tx.send_if_modified(|cur| {
        if *cur != safe {
            *cur = safe;
            true
        } else {
            false
        }
    })
}

/// Back-off after a socket error so a persistent failure does not spin.
pub(crate) async fn pause_after_error() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
