use std::time::Duration;

use homer_proto::EffortCommand;
use tracing::{debug, error, info, warn};

use crate::error::LinkError;

/// What a backend decoded from one inbound vehicle message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to an arm/disarm request, carrying the vehicle's own armed flag.
    Ack { armed: bool },
    /// The vehicle refused an arm/disarm request. Carries no armed state.
    Rejected,
    /// Periodic liveness message. `armed` is set when the backend reports it.
    Status { armed: Option<bool> },
    Log { severity: Severity, sender: String, text: String },
    /// Parsed, but of no interest to the link.
    Other,
}

/// Severity of a log line forwarded by the vehicle firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Unknown level names are treated as `Info`.
    pub fn parse(level: &str) -> Self {
        match level.trim().to_ascii_lowercase().as_str() {
            "debug" => Severity::Debug,
            "warn" | "warning" => Severity::Warning,
            "error" => Severity::Error,
            "critical" | "fatal" => Severity::Critical,
            _ => Severity::Info,
        }
    }

    pub fn emit(self, sender: &str, text: &str) {
        match self {
            Severity::Debug => debug!("vehicle[{}]: {}", sender, text),
            Severity::Info => info!("vehicle[{}]: {}", sender, text),
            Severity::Warning => warn!("vehicle[{}]: {}", sender, text),
            Severity::Error | Severity::Critical => error!("vehicle[{}]: {}", sender, text),
        }
    }
}

/// Byte-level half of a vehicle backend. The handshake logic in
/// [`crate::Link`] is written once against this trait.
pub trait Transport: Send {
    fn send_arm_request(&mut self, arm: bool) -> Result<(), LinkError>;

    fn send_effort(&mut self, cmd: EffortCommand) -> Result<(), LinkError>;

    /// Next inbound message, or `None` if nothing complete arrived in `timeout`.
    fn recv(&mut self, timeout: Duration) -> Result<Option<Inbound>, LinkError>;

    /// Discard anything buffered so the next message read is a reply.
    fn clear_input(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}
