use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use homer_proto::EffortCommand;
use mavlink::{
    common::{
        MavCmd, MavMessage, MavModeFlag, MavResult, COMMAND_LONG_DATA, MANUAL_CONTROL_DATA,
    },
    MavConnection, MavHeader,
};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::transport::{Inbound, Transport};

type Conn = Arc<dyn MavConnection<MavMessage> + Send + Sync>;
type Frame = (MavHeader, MavMessage);

/// MAVLink ids for our side and the autopilot.
#[derive(Debug, Clone, Copy)]
pub struct MavIds {
    pub sys_id: u8,
    pub comp_id: u8,
    pub target_sys: u8,
    pub target_comp: u8,
}

impl Default for MavIds {
    fn default() -> Self {
        Self { sys_id: 255, comp_id: 190, target_sys: 1, target_comp: 1 }
    }
}

/// Autopilot backend. A reader thread drains the connection so `recv`
/// can honour a timeout; all writes go through `&mut self`.
pub struct MavTransport {
    conn: Conn,
    rx: Receiver<Frame>,
    /// Set on drop; the reader thread exits at its next wakeup.
    stop: Arc<AtomicBool>,
    hdr: MavHeader,
    ids: MavIds,
    /// Last arm/disarm value requested, used to interpret COMMAND_ACK.
    pending_arm: Option<bool>,
}

impl MavTransport {
    pub fn open(dev: &str, baud: u32, ids: MavIds) -> Result<Self> {
        // quick validate device
        let _ = tokio_serial::new(dev, baud)
            .open_native_async()
            .with_context(|| format!("open autopilot serial device {}", dev))?;

        let url = format!("serial:{}:{}", dev, baud);
        let conn: Conn = Arc::from(
            mavlink::connect::<MavMessage>(&url).with_context(|| format!("mavlink connect {}", url))?,
        );

        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let reader = Arc::clone(&conn);
        let reader_stop = Arc::clone(&stop);
        std::thread::Builder::new()
            .name("mav-reader".into())
            .spawn(move || pump(|| reader.recv(), &tx, &reader_stop))
            .context("spawn mavlink reader")?;

        Ok(Self {
            conn,
            rx,
            stop,
            hdr: MavHeader { system_id: ids.sys_id, component_id: ids.comp_id, sequence: 0 },
            ids,
            pending_arm: None,
        })
    }

    /// Blocks until the autopilot's first HEARTBEAT.
    pub fn wait_heartbeat(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(false);
            }
            match self.rx.recv_timeout(left) {
                Ok((hdr, MavMessage::HEARTBEAT(_))) if hdr.system_id == self.ids.target_sys => return Ok(true),
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => return Ok(false),
                Err(RecvTimeoutError::Disconnected) => anyhow::bail!("mavlink reader stopped"),
            }
        }
    }

    /// Switches the autopilot to the given custom mode and waits for the
    /// command ack. Returns whether it was accepted.
    pub fn set_mode(&mut self, custom_mode: u32, timeout: Duration) -> Result<bool> {
        self.command_long(MavCmd::MAV_CMD_DO_SET_MODE, [
            MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED.bits() as f32,
            custom_mode as f32,
            0.0, 0.0, 0.0, 0.0, 0.0,
        ])?;

        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                warn!("mav: no ack for mode {}", custom_mode);
                return Ok(false);
            }
            match self.rx.recv_timeout(left) {
                Ok((_, MavMessage::COMMAND_ACK(ack))) if ack.command == MavCmd::MAV_CMD_DO_SET_MODE => {
                    let ok = ack.result == MavResult::MAV_RESULT_ACCEPTED;
                    if ok {
                        info!("mav: mode {} accepted", custom_mode);
                    } else {
                        warn!("mav: mode {} rejected: {:?}", custom_mode, ack.result);
                    }
                    return Ok(ok);
                }
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => return Ok(false),
                Err(RecvTimeoutError::Disconnected) => anyhow::bail!("mavlink reader stopped"),
            }
        }
    }

    fn command_long(&mut self, command: MavCmd, p: [f32; 7]) -> Result<(), LinkError> {
        let cmd = COMMAND_LONG_DATA {
            target_system: self.ids.target_sys,
            target_component: self.ids.target_comp,
            command,
            confirmation: 0,
            param1: p[0],
            param2: p[1],
            param3: p[2],
            param4: p[3],
            param5: p[4],
            param6: p[5],
            param7: p[6],
        };
        self.send(MavMessage::COMMAND_LONG(cmd))
    }

    fn send(&mut self, msg: MavMessage) -> Result<(), LinkError> {
        self.hdr.sequence = self.hdr.sequence.wrapping_add(1);
        self.conn
            .send(&self.hdr, &msg)
            .map_err(|e| LinkError::Protocol(format!("mavlink send: {:?}", e)))?;
        Ok(())
    }
}

impl Drop for MavTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Reader loop: forwards frames until `stop` is set or the receiving side
/// is gone. Frames read after `stop` are discarded.
fn pump<E: std::fmt::Debug>(
    mut recv: impl FnMut() -> Result<Frame, E>,
    tx: &Sender<Frame>,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::Relaxed) {
        match recv() {
            Ok(frame) => {
                if stop.load(Ordering::Relaxed) || tx.send(frame).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("mav: recv error: {:?}", e);
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
    debug!("mav: reader stopped");
}

/// Interprets one frame from the autopilot. `pending` is the last arm
/// request still awaiting its COMMAND_ACK; it is consumed by a final result.
pub fn decode(hdr: &MavHeader, msg: &MavMessage, target_sys: u8, pending: &mut Option<bool>) -> Inbound {
    match msg {
        MavMessage::HEARTBEAT(hb) if hdr.system_id == target_sys => Inbound::Status {
            armed: Some(hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED)),
        },
        MavMessage::COMMAND_ACK(ack) if ack.command == MavCmd::MAV_CMD_COMPONENT_ARM_DISARM => {
            if ack.result == MavResult::MAV_RESULT_IN_PROGRESS {
                return Inbound::Other;
            }
            let Some(requested) = pending.take() else {
                return Inbound::Other;
            };
            if ack.result == MavResult::MAV_RESULT_ACCEPTED {
                Inbound::Ack { armed: requested }
            } else {
                debug!("mav: arm/disarm result {:?}", ack.result);
                Inbound::Rejected
            }
        }
        _ => Inbound::Other,
    }
}

/// Signed effort to MANUAL_CONTROL axes: x forward positive, r clockwise
/// positive, z at throttle neutral.
pub fn manual_control_axes(cmd: EffortCommand) -> (i16, i16, i16) {
    (-cmd.pitch as i16, 500, -cmd.yaw as i16)
}

impl Transport for MavTransport {
    fn send_arm_request(&mut self, arm: bool) -> Result<(), LinkError> {
        self.pending_arm = Some(arm);
        self.command_long(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, [
            if arm { 1.0 } else { 0.0 },
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ])
    }

    fn send_effort(&mut self, cmd: EffortCommand) -> Result<(), LinkError> {
        let (x, z, r) = manual_control_axes(cmd);
        self.send(MavMessage::MANUAL_CONTROL(MANUAL_CONTROL_DATA {
            x,
            y: 0,
            z,
            r,
            buttons: 0,
            target: self.ids.target_sys,
            ..Default::default()
        }))
    }

    fn recv(&mut self, timeout: Duration) -> Result<Option<Inbound>, LinkError> {
        match self.rx.recv_timeout(timeout) {
            Ok((hdr, msg)) => Ok(Some(decode(&hdr, &msg, self.ids.target_sys, &mut self.pending_arm))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Closed),
        }
    }

    fn clear_input(&mut self) -> Result<(), LinkError> {
        while self.rx.try_recv().is_ok() {}
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mavlink"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::common::{MavAutopilot, MavState, MavType, COMMAND_ACK_DATA, HEARTBEAT_DATA};

    #[test]
    fn manual_control_sign_mapping() {
        assert_eq!(manual_control_axes(EffortCommand::NEUTRAL), (0, 500, 0));
        // forward and clockwise
        assert_eq!(manual_control_axes(EffortCommand::new(-200, -300)), (200, 500, 300));
        assert_eq!(manual_control_axes(EffortCommand::new(1000, 1000)), (-1000, 500, -1000));
    }

    const HDR: MavHeader = MavHeader { system_id: 1, component_id: 1, sequence: 0 };

    fn arm_ack(result: MavResult) -> MavMessage {
        MavMessage::COMMAND_ACK(COMMAND_ACK_DATA {
            command: MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            result,
            ..Default::default()
        })
    }

    fn heartbeat(base_mode: MavModeFlag) -> MavMessage {
        MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_SURFACE_BOAT,
            autopilot: MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
            base_mode,
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        })
    }

    #[test]
    fn accepted_ack_reports_requested_state() {
        let mut pending = Some(true);
        assert_eq!(
            decode(&HDR, &arm_ack(MavResult::MAV_RESULT_ACCEPTED), 1, &mut pending),
            Inbound::Ack { armed: true }
        );
        assert_eq!(pending, None);
    }

    #[test]
    fn refused_ack_carries_no_armed_state() {
        for result in [MavResult::MAV_RESULT_DENIED, MavResult::MAV_RESULT_FAILED, MavResult::MAV_RESULT_TEMPORARILY_REJECTED] {
            let mut pending = Some(false);
            assert_eq!(decode(&HDR, &arm_ack(result), 1, &mut pending), Inbound::Rejected);
            assert_eq!(pending, None);
        }
    }

    #[test]
    fn in_progress_and_unsolicited_acks_are_ignored() {
        let mut pending = Some(false);
        assert_eq!(decode(&HDR, &arm_ack(MavResult::MAV_RESULT_IN_PROGRESS), 1, &mut pending), Inbound::Other);
        assert_eq!(pending, Some(false));

        let mut pending = None;
        assert_eq!(decode(&HDR, &arm_ack(MavResult::MAV_RESULT_ACCEPTED), 1, &mut pending), Inbound::Other);
    }

    #[test]
    fn heartbeat_reports_safety_armed_flag_from_target_only() {
        let mut pending = None;
        let armed = heartbeat(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED | MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED);
        assert_eq!(decode(&HDR, &armed, 1, &mut pending), Inbound::Status { armed: Some(true) });
        let idle = heartbeat(MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED);
        assert_eq!(decode(&HDR, &idle, 1, &mut pending), Inbound::Status { armed: Some(false) });

        let gcs = MavHeader { system_id: 255, ..HDR };
        assert_eq!(decode(&gcs, &armed, 1, &mut pending), Inbound::Other);
    }

    #[test]
    fn reader_exits_on_stop_even_without_frames() {
        let (tx, rx) = mpsc::channel();
        let stop = AtomicBool::new(false);
        let mut errors = 0;
        pump(
            || {
                errors += 1;
                if errors == 3 {
                    stop.store(true, Ordering::Relaxed);
                }
                Err::<Frame, &str>("no data")
            },
            &tx,
            &stop,
        );
        assert_eq!(errors, 3);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reader_discards_frame_read_after_stop() {
        let (tx, rx) = mpsc::channel();
        let stop = AtomicBool::new(false);
        pump(
            || {
                stop.store(true, Ordering::Relaxed);
                Ok::<Frame, &str>((HDR, heartbeat(MavModeFlag::empty())))
            },
            &tx,
            &stop,
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reader_exits_when_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let stop = AtomicBool::new(false);
        let mut reads = 0;
        pump(
            || {
                reads += 1;
                Ok::<Frame, &str>((HDR, heartbeat(MavModeFlag::empty())))
            },
            &tx,
            &stop,
        );
        assert_eq!(reads, 1);
    }
}
