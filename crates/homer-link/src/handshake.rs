use std::time::{Duration, Instant};

use homer_proto::EffortCommand;
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::transport::{Inbound, Transport};

/// Capability interface shared by every vehicle backend.
pub trait VehicleLink: Send {
    /// Blocks until the vehicle acknowledges `armed = true` or the retry
    /// budget is spent.
    fn arm(&mut self) -> Result<(), LinkError>;

    fn disarm(&mut self) -> Result<(), LinkError>;

    /// Sends disarm requests until the vehicle acknowledges one, whatever
    /// the local flag says. For one-shot tools that start without state.
    fn force_disarm(&mut self) -> Result<(), LinkError>;

    /// Fire-and-forget effort command.
    fn send_cmd(&mut self, cmd: EffortCommand) -> Result<(), LinkError>;

    /// Reads at most one inbound message and folds it into link state.
    /// Returns whether anything arrived.
    fn poll(&mut self, timeout: Duration) -> Result<bool, LinkError>;

    fn armed(&self) -> bool;

    fn heartbeat(&self) -> u64;

    fn backend(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct HandshakePolicy {
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    /// How long to wait for a reply after each request.
    pub ack_timeout: Duration,
}

impl Default for HandshakePolicy {
    fn default() -> Self {
        Self { max_attempts: Some(5), ack_timeout: Duration::from_secs(3) }
    }
}

/// Request/acknowledge state machine over any [`Transport`].
///
/// `armed` only ever rises on an explicit acknowledgement. Status messages
/// may lower it (vehicle-side disarm or failsafe) but never raise it.
pub struct Link<T> {
    transport: T,
    policy: HandshakePolicy,
    armed: bool,
    heartbeat: u64,
}

impl<T: Transport> Link<T> {
    pub fn new(transport: T, policy: HandshakePolicy) -> Self {
        Self { transport, policy, armed: false, heartbeat: 0 }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// With `confirm`, at least one acknowledgement is required even if the
    /// local flag already matches.
    fn handshake(&mut self, want: bool, confirm: bool) -> Result<(), LinkError> {
        let verb = if want { "arm" } else { "disarm" };
        let mut attempts = 0u32;
        let mut acked = !confirm;

        while self.armed != want || !acked {
            if let Some(max) = self.policy.max_attempts {
                if attempts >= max {
                    warn!("link: {} not acknowledged after {} attempt(s)", verb, attempts);
                    return Err(LinkError::NotAcknowledged { requested: want, attempts });
                }
            }
            attempts += 1;
            info!("link: {} request (attempt {})", verb, attempts);

            self.transport.clear_input()?;
            self.transport.send_arm_request(want)?;
            acked |= self.await_ack(want)?;
        }

        info!("link: {} acknowledged by vehicle", verb);
        Ok(())
    }

    /// Reads until an acknowledgement arrives or the ack window closes.
    /// Returns whether one arrived.
    fn await_ack(&mut self, want: bool) -> Result<bool, LinkError> {
        let deadline = Instant::now() + self.policy.ack_timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                debug!("link: ack window closed");
                return Ok(false);
            }
            match self.transport.recv(left)? {
                Some(Inbound::Ack { armed }) => {
                    self.heartbeat += 1;
                    self.armed = armed;
                    if armed != want {
                        warn!("link: vehicle replied armed={} to a request for {}", armed, want);
                    }
                    return Ok(true);
                }
                Some(Inbound::Rejected) => {
                    warn!("link: vehicle refused {} request", if want { "arm" } else { "disarm" });
                    return Ok(false);
                }
                Some(other) => self.absorb(other),
                None => {
                    debug!("link: no reply");
                    return Ok(false);
                }
            }
        }
    }

    fn absorb(&mut self, msg: Inbound) {
        match msg {
            Inbound::Ack { armed } => {
                // late ack outside a handshake: only trusted to lower
                self.heartbeat += 1;
                if !armed {
                    self.lower_armed();
                }
            }
            Inbound::Status { armed } => {
                self.heartbeat += 1;
                if armed == Some(false) {
                    self.lower_armed();
                }
            }
            Inbound::Log { severity, sender, text } => severity.emit(&sender, &text),
            Inbound::Rejected | Inbound::Other => {}
        }
    }

    fn lower_armed(&mut self) {
        if self.armed {
            warn!("link: vehicle reports disarmed");
            self.armed = false;
        }
    }
}

impl<T: Transport> VehicleLink for Link<T> {
    fn arm(&mut self) -> Result<(), LinkError> {
        self.handshake(true, false)
    }

    fn disarm(&mut self) -> Result<(), LinkError> {
        self.handshake(false, false)
    }

    fn force_disarm(&mut self) -> Result<(), LinkError> {
        self.handshake(false, true)
    }

    fn send_cmd(&mut self, cmd: EffortCommand) -> Result<(), LinkError> {
        self.transport.send_effort(cmd)
    }

    fn poll(&mut self, timeout: Duration) -> Result<bool, LinkError> {
        match self.transport.recv(timeout)? {
            Some(msg) => {
                self.absorb(msg);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn armed(&self) -> bool {
        self.armed
    }

    fn heartbeat(&self) -> u64 {
        self.heartbeat
    }

    fn backend(&self) -> &'static str {
        self.transport.name()
    }
}
