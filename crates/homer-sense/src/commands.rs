use anyhow::Result;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use homer_proto::messages::{parse_ground, GroundPacket, OperatorCommand};
use homer_proto::OperatorState;

use crate::config::CommandConfig;
use crate::{bind, pause_after_error, Listener, MAX_DATAGRAM};

/// Operator commands are events, not samples: there is no deadline and the
/// state persists until the next command.
pub async fn spawn_commands(cfg: &CommandConfig, initial: OperatorState) -> Result<Listener<OperatorState>> {
    let sock = bind(cfg.bind(), "command").await?;
    let local_addr = sock.local_addr()?;
    let (tx, rx) = watch::channel(initial);
    info!("commands: listening on {}", local_addr);
    let task = tokio::spawn(run(sock, tx));
    Ok(Listener { rx, local_addr, task })
}

pub fn apply_command(state: &mut OperatorState, cmd: &OperatorCommand) {
    match cmd {
        OperatorCommand::Arm { arm } => {
            state.arm = *arm;
            state.arm_seq += 1;
        }
        OperatorCommand::Tune { .. } => {
            if let Some(g) = cmd.gains() {
                state.gains = g;
            }
        }
        OperatorCommand::Threshold { .. } => {
            if let Some(th) = cmd.thresholds() {
                state.thresholds = th;
            }
        }
    }
}

async fn run(sock: UdpSocket, tx: watch::Sender<OperatorState>) {
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        let received = tokio::select! {
            _ = tx.closed() => break,
            r = sock.recv_from(&mut buf) => r,
        };
        let n = match received {
            Ok((n, _)) => n,
            Err(e) => {
                warn!("commands: recv failed: {}", e);
                pause_after_error().await;
                continue;
            }
        };

        match parse_ground(&buf[..n]) {
            Ok(GroundPacket::Cmd(cmd)) => {
                info!("commands: {:?}", cmd);
                tx.send_modify(|s| apply_command(s, &cmd));
            }
            Ok(other) => debug!("commands: ignoring {:?}", other),
            Err(e) => warn!("commands: dropping packet: {}", e),
        }
    }
    debug!("commands: no readers left, stopping");
}
