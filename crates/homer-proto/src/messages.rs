//! Datagrams exchanged with the ground station and the on-board sensors.
//!
//! Every packet is a single JSON object. Ground station packets carry a
//! `type` discriminator (`js`, `cmd`, `vision`); the radio compass sends bare
//! `{bearing, strength, confidence}` objects.

use serde::{Deserialize, Deserializer, Serialize};

use crate::state::{ControllerGains, JoystickState, ValidityThresholds, VisionSample};
use crate::ProtoError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GroundPacket {
    Js(JoystickPacket),
    Cmd(OperatorCommand),
    Vision(VisionPacket),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoystickPacket {
    pub ax: Vec<f64>,
    // pygame reports buttons as 0/1, the LoRa ground station as booleans
    #[serde(deserialize_with = "flexible_bools")]
    pub bt: Vec<bool>,
}

impl From<JoystickPacket> for JoystickState {
    fn from(p: JoystickPacket) -> Self {
        JoystickState { axes: p.ax, buttons: p.bt }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum OperatorCommand {
    Tune {
        #[serde(rename = "Kp", default)]
        kp: f64,
        #[serde(rename = "Ki", default)]
        ki: f64,
        #[serde(rename = "Kd", default)]
        kd: f64,
    },
    Threshold {
        #[serde(default)]
        power: f64,
        #[serde(default)]
        conf: f64,
    },
    Arm { arm: bool },
}

impl OperatorCommand {
    pub fn gains(&self) -> Option<ControllerGains> {
        match *self {
            OperatorCommand::Tune { kp, ki, kd } => Some(ControllerGains { kp, ki, kd }),
            _ => None,
        }
    }

    pub fn thresholds(&self) -> Option<ValidityThresholds> {
        match *self {
            OperatorCommand::Threshold { power, conf } => {
                Some(ValidityThresholds { min_strength: power, min_confidence: conf })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisionPacket {
    #[serde(default)]
    pub bearing: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
}

impl From<VisionPacket> for VisionSample {
    fn from(p: VisionPacket) -> Self {
        VisionSample { bearing: p.bearing, distance: p.distance }
    }
}

/// Direction-finder output. `power` is accepted as an alias for `strength`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompassPacket {
    #[serde(default)]
    pub bearing: Option<f64>,
    #[serde(default, alias = "power")]
    pub strength: f64,
    #[serde(default)]
    pub confidence: f64,
}

pub fn parse_ground(bytes: &[u8]) -> Result<GroundPacket, ProtoError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn parse_joystick(bytes: &[u8]) -> Result<JoystickPacket, ProtoError> {
    match parse_ground(bytes)? {
        GroundPacket::Js(p) => Ok(p),
        GroundPacket::Cmd(_) => Err(ProtoError::UnexpectedType("cmd")),
        GroundPacket::Vision(_) => Err(ProtoError::UnexpectedType("vision")),
    }
}

pub fn parse_compass(bytes: &[u8]) -> Result<CompassPacket, ProtoError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn flexible_bools<'de, D>(de: D) -> Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Num(f64),
    }

    let raw = Vec::<Flag>::deserialize(de)?;
    Ok(raw
        .into_iter()
        .map(|f| match f {
            Flag::Bool(b) => b,
            Flag::Num(n) => n != 0.0,
        })
        .collect())
}
