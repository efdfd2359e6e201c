//! Newline-framed JSON link to a motor-controller board.
//!
//! Outbound: `{"arm":true}`, `{"disarm":true}`, `{"pitch":P,"yaw":Y}`, each
//! stamped with `sender`/`target`. The board expects pitch on 0 (full reverse)
//! to 1000 (full forward), 500 neutral; yaw is passed through.
//!
//! Inbound: `{"ack":..,"arm":bool}` answers a handshake, a bare `{"ack":..}`
//! is a status beat, `{"log":..,"level":..,"echo":..}` is firmware logging.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use homer_proto::EffortCommand;
use serde_json::{json, Value};
use tokio_serial::{ClearBuffer, SerialPort};
use tracing::{debug, warn};

use crate::error::LinkError;
use crate::transport::{Inbound, Severity, Transport};

/// Line-oriented byte port: read with a settable timeout, discard input.
pub trait LinePort: Read + Write + Send {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
    fn discard_input(&mut self) -> io::Result<()>;
}

impl LinePort for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

pub struct JsonLineTransport<P: LinePort> {
    port: BufReader<P>,
    partial: Vec<u8>,
    sender: String,
    target: String,
}

impl JsonLineTransport<Box<dyn SerialPort>> {
    pub fn open(dev: &str, baud: u32, sender: &str, target: &str) -> Result<Self> {
        let port = tokio_serial::new(dev, baud)
            .timeout(Duration::from_millis(100))
            .open()
            .with_context(|| format!("open json-line serial device {}", dev))?;
        Ok(Self::new(port, sender, target))
    }
}

impl<P: LinePort> JsonLineTransport<P> {
    pub fn new(port: P, sender: &str, target: &str) -> Self {
        Self {
            port: BufReader::new(port),
            partial: Vec::new(),
            sender: sender.to_string(),
            target: target.to_string(),
        }
    }

    pub fn get_ref(&self) -> &P {
        self.port.get_ref()
    }

    fn write_obj(&mut self, mut obj: Value) -> Result<(), LinkError> {
        obj["sender"] = Value::from(self.sender.as_str());
        obj["target"] = Value::from(self.target.as_str());
        let mut line = obj.to_string();
        line.push('\n');
        let port = self.port.get_mut();
        port.write_all(line.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    /// Completes one line, keeping partial input across timeouts.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, LinkError> {
        self.port.get_mut().set_read_timeout(timeout)?;
        match self.port.read_until(b'\n', &mut self.partial) {
            Ok(0) => Ok(None),
            Ok(_) if self.partial.ends_with(b"\n") => Ok(Some(std::mem::take(&mut self.partial))),
            Ok(_) => Ok(None),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl<P: LinePort> Transport for JsonLineTransport<P> {
    fn send_arm_request(&mut self, arm: bool) -> Result<(), LinkError> {
        let obj = if arm { json!({ "arm": true }) } else { json!({ "disarm": true }) };
        self.write_obj(obj)
    }

    fn send_effort(&mut self, cmd: EffortCommand) -> Result<(), LinkError> {
        let (pitch, yaw) = board_effort(cmd);
        self.write_obj(json!({ "pitch": pitch, "yaw": yaw }))
    }

    fn recv(&mut self, timeout: Duration) -> Result<Option<Inbound>, LinkError> {
        Ok(self.read_line(timeout)?.map(|line| decode_line(&line)))
    }

    fn clear_input(&mut self) -> Result<(), LinkError> {
        let buffered = self.port.buffer().len();
        self.port.consume(buffered);
        self.partial.clear();
        self.port.get_mut().discard_input()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json-line"
    }
}

/// Signed pitch (negative forward) to the board's 0..1000 forward scale.
pub fn board_effort(cmd: EffortCommand) -> (i32, i32) {
    (500 - cmd.pitch / 2, cmd.yaw)
}

pub fn decode_line(line: &[u8]) -> Inbound {
    let v: Value = match serde_json::from_slice(line) {
        Ok(v) => v,
        Err(e) => {
            warn!("json-line: corrupted message ({}): {:?}", e, String::from_utf8_lossy(line).trim_end());
            return Inbound::Other;
        }
    };

    if let Some(text) = v.get("log") {
        let sender = v.get("sender").and_then(Value::as_str).unwrap_or("vehicle");
        let level = v.get("level").and_then(Value::as_str).unwrap_or("info");
        let mut text = text.as_str().map(str::to_string).unwrap_or_else(|| text.to_string());
        if let Some(echo) = v.get("echo").and_then(Value::as_str) {
            text = format!("{} (echo: {})", text, echo.trim_end());
        }
        return Inbound::Log { severity: Severity::parse(level), sender: sender.to_string(), text };
    }

    let arm = v.get("arm").and_then(Value::as_bool);
    if v.get("ack").is_some() {
        return match arm {
            Some(armed) => Inbound::Ack { armed },
            None => Inbound::Status { armed: None },
        };
    }
    if arm.is_some() {
        return Inbound::Status { armed: arm };
    }

    debug!("json-line: ignoring {}", v);
    Inbound::Other
}
