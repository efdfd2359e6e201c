use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use homer_proto::state::{AXIS_FORWARD, AXIS_TURN, BUTTON_ARM, BUTTON_DISARM};
use homer_proto::telemetry::ControlMode;
use homer_proto::{
    BearingSample, EffortCommand, JoystickState, OperatorState, VisionSample,
};

use crate::config::{ControlConfig, PidConfig};
use crate::gate::PeriodicGate;
use crate::pid::HeadingController;

/// What the arbiter needs to know about the vehicle link this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkView {
    /// As acknowledged by the vehicle.
    pub armed: bool,
    /// An arm/disarm handshake is in flight.
    pub handshake_pending: bool,
    /// Monotonic count of handshakes that ran out of retries.
    pub failed_handshakes: u64,
}

/// Snapshot of every input source for one tick.
#[derive(Debug, Clone, Copy)]
pub struct ArbiterInputs<'a> {
    pub joystick: &'a JoystickState,
    pub compass: &'a BearingSample,
    pub vision: &'a VisionSample,
    pub operator: &'a OperatorState,
    pub link: LinkView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    None,
    Arm,
    Disarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutput {
    pub mode: ControlMode,
    /// `Some` on every tick the vehicle is armed; must be sent even when
    /// unchanged, the link treats it as a deadman signal.
    pub command: Option<EffortCommand>,
    pub action: LinkAction,
}

#[derive(Debug, Clone)]
struct Tuning {
    tolerance_deg: f64,
    forward_speed: i32,
    yaw_speed: i32,
    near_field_m: Option<f64>,
    joystick_arming: bool,
}

/// Chooses between manual override, beacon homing and neutral hold, and
/// drives the arm/disarm lifecycle from operator intent.
pub struct ControlArbiter {
    tuning: Tuning,
    pid: HeadingController,
    dwell: PeriodicGate,

    want_armed: bool,
    seen_arm_seq: u64,
    seen_failures: u64,
    link_was_armed: bool,
    committed: bool,
    mode: ControlMode,
    effort: EffortCommand,
}

impl ControlArbiter {
    pub fn new(ctl: &ControlConfig, pid: &PidConfig, now: Instant) -> Self {
        let controller = HeadingController::new(pid.gains(), pid.output_limit(), pid.output_scale())
            .with_min_sample(pid.min_sample());
        Self::with_parts(ctl, controller, ctl.dwell(), now)
    }

    fn with_parts(ctl: &ControlConfig, pid: HeadingController, dwell: Duration, now: Instant) -> Self {
        Self {
            tuning: Tuning {
                tolerance_deg: ctl.tolerance_deg(),
                forward_speed: ctl.forward_speed(),
                yaw_speed: ctl.yaw_speed(),
                near_field_m: ctl.near_field_m.filter(|m| *m > 0.0),
                joystick_arming: ctl.joystick_arming(),
            },
            pid,
            dwell: PeriodicGate::new_at(dwell, now),
            want_armed: false,
            seen_arm_seq: 0,
            seen_failures: 0,
            link_was_armed: false,
            committed: false,
            mode: ControlMode::Idle,
            effort: EffortCommand::NEUTRAL,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Last commanded effort, neutral while idle.
    pub fn effort(&self) -> EffortCommand {
        self.effort
    }

    pub fn controller(&self) -> &HeadingController {
        &self.pid
    }

    pub fn wants_armed(&self) -> bool {
        self.want_armed
    }

    pub fn tick(&mut self, inp: &ArbiterInputs<'_>, now: Instant) -> TickOutput {
        self.absorb_operator(inp);

        let link = inp.link;
        if !link.armed {
            self.hold_neutral(now);
            let action = if self.want_armed && !link.handshake_pending {
                info!("arbiter: requesting arm");
                LinkAction::Arm
            } else {
                LinkAction::None
            };
            return self.finish(ControlMode::Idle, None, action);
        }

        if !self.want_armed {
            self.hold_neutral(now);
            let action = if link.handshake_pending {
                LinkAction::None
            } else {
                info!("arbiter: requesting disarm");
                LinkAction::Disarm
            };
            return self.finish(ControlMode::Idle, Some(EffortCommand::NEUTRAL), action);
        }

        let (mode, effort) = if inp.joystick.override_active() {
            (ControlMode::ManualOverride, self.manual(inp.joystick, now))
        } else if let Some(bearing) = inp.compass.valid_bearing(&inp.operator.thresholds) {
            (ControlMode::AutonomousHoming, self.homing(bearing, inp.vision, now))
        } else {
            self.hold_neutral(now);
            (ControlMode::AutonomousWaiting, EffortCommand::NEUTRAL)
        };
        self.finish(mode, Some(effort), LinkAction::None)
    }

    fn absorb_operator(&mut self, inp: &ArbiterInputs<'_>) {
        let op = inp.operator;
        if op.gains != self.pid.gains() {
            info!("arbiter: retuned Kp={} Ki={} Kd={}", op.gains.kp, op.gains.ki, op.gains.kd);
            self.pid.set_gains(op.gains);
        }

        if op.arm_seq != self.seen_arm_seq {
            self.seen_arm_seq = op.arm_seq;
            self.want_armed = op.arm;
            info!("arbiter: operator requests {}", if op.arm { "arm" } else { "disarm" });
        }

        let js = inp.joystick;
        if self.tuning.joystick_arming && js.override_active() {
            if js.button(BUTTON_DISARM) {
                if self.want_armed {
                    info!("arbiter: joystick requests disarm");
                }
                self.want_armed = false;
            } else if js.button(BUTTON_ARM) && !self.want_armed {
                if js.sticks_neutral() {
                    info!("arbiter: joystick requests arm");
                    self.want_armed = true;
                } else {
                    info!("arbiter: joystick pitch and yaw must be neutral for arming");
                }
            }
        }

        // A failed arm drops the intent. A failed disarm keeps it, so the
        // vehicle stays at neutral and the disarm is retried.
        if inp.link.failed_handshakes > self.seen_failures {
            self.seen_failures = inp.link.failed_handshakes;
            if self.want_armed && !inp.link.armed {
                warn!("arbiter: arm not acknowledged by vehicle, request dropped");
                self.want_armed = false;
            } else if !self.want_armed && inp.link.armed {
                warn!("arbiter: disarm not acknowledged by vehicle, retrying");
            }
        }

        // vehicle-side disarm (failsafe, RC switch) is never undone automatically
        if self.link_was_armed && !inp.link.armed && !inp.link.handshake_pending && self.want_armed {
            warn!("arbiter: vehicle disarmed itself, operator must re-arm");
            self.want_armed = false;
        }
        self.link_was_armed = inp.link.armed;
    }

    fn manual(&mut self, js: &JoystickState, now: Instant) -> EffortCommand {
        self.hold_neutral(now);
        EffortCommand::from_unit(js.axis(AXIS_FORWARD), -js.axis(AXIS_TURN))
    }

    fn homing(&mut self, bearing: f64, vision: &VisionSample, now: Instant) -> EffortCommand {
        if bearing.abs() < self.tuning.tolerance_deg {
            let yaw = self.pid.yaw(bearing, now);
            if !self.committed && self.dwell.elapsed_at(now) {
                info!("arbiter: heading settled at {:.1} deg, advancing", bearing);
                self.committed = true;
            }
            let pitch = if self.committed { -self.forward_speed(vision) } else { 0 };
            EffortCommand::new(pitch, yaw)
        } else {
            // Coarse turn at fixed rate; the PID only trims inside the band.
            self.dwell.reset_at(now);
            self.committed = false;
            self.pid.reset();
            let yaw = if bearing > 0.0 { -self.tuning.yaw_speed } else { self.tuning.yaw_speed };
            EffortCommand::new(0, yaw)
        }
    }

    fn forward_speed(&self, vision: &VisionSample) -> i32 {
        let full = self.tuning.forward_speed;
        match (self.tuning.near_field_m, vision.distance) {
            (Some(near), Some(d)) if d.is_finite() && d < near => {
                (full as f64 * (d.max(0.0) / near)) as i32
            }
            _ => full,
        }
    }

    fn hold_neutral(&mut self, now: Instant) {
        self.pid.reset();
        self.dwell.reset_at(now);
        self.committed = false;
    }

    fn finish(&mut self, mode: ControlMode, command: Option<EffortCommand>, action: LinkAction) -> TickOutput {
        if mode != self.mode {
            info!("arbiter: {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
        self.effort = command.unwrap_or(EffortCommand::NEUTRAL);
        debug!("arbiter: mode={:?} effort={:?} action={:?}", mode, self.effort, action);
        TickOutput { mode, command, action }
    }
}
