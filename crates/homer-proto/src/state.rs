use serde::{Deserialize, Serialize};

pub const JOYSTICK_AXES: usize = 6;
pub const JOYSTICK_BUTTONS: usize = 6;

pub const AXIS_TURN: usize = 0;
pub const AXIS_FORWARD: usize = 1;
pub const AXIS_OVERRIDE: usize = 2;
pub const BUTTON_ARM: usize = 0;
pub const BUTTON_DISARM: usize = 1;

/// Latest joystick sample. Neutral (all zero) is the safe default.
#[derive(Debug, Clone, PartialEq)]
pub struct JoystickState {
    pub axes: Vec<f64>,
    pub buttons: Vec<bool>,
}

impl Default for JoystickState {
    fn default() -> Self {
        Self {
            axes: vec![0.0; JOYSTICK_AXES],
            buttons: vec![false; JOYSTICK_BUTTONS],
        }
    }
}

impl JoystickState {
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Missing axes read as 0 and non-finite values are treated as neutral.
    pub fn axis(&self, i: usize) -> f64 {
        match self.axes.get(i) {
            Some(v) if v.is_finite() => v.clamp(-1.0, 1.0),
            _ => 0.0,
        }
    }

    pub fn button(&self, i: usize) -> bool {
        self.buttons.get(i).copied().unwrap_or(false)
    }

    /// Manual override is held while the trigger axis reads above zero.
    pub fn override_active(&self) -> bool {
        self.axis(AXIS_OVERRIDE) > 0.0
    }

    pub fn sticks_neutral(&self) -> bool {
        self.axis(AXIS_TURN) == 0.0 && self.axis(AXIS_FORWARD) == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidityThresholds {
    pub min_strength: f64,
    pub min_confidence: f64,
}

impl Default for ValidityThresholds {
    fn default() -> Self {
        Self { min_strength: 10.0, min_confidence: 5.0 }
    }
}

/// Latest direction-finder reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BearingSample {
    /// Receiver angle as reported, [0, 360).
    pub raw: Option<f64>,
    /// Signed bearing, (-180, 180], 0 = dead ahead.
    pub bearing: Option<f64>,
    pub strength: f64,
    pub confidence: f64,
}

impl BearingSample {
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn is_valid(&self, th: &ValidityThresholds) -> bool {
        self.bearing.map(f64::is_finite).unwrap_or(false)
            && self.strength >= th.min_strength
            && self.confidence >= th.min_confidence
    }

    /// The bearing, only if it passes the validity gate.
    pub fn valid_bearing(&self, th: &ValidityThresholds) -> Option<f64> {
        if self.is_valid(th) { self.bearing } else { None }
    }
}

/// Optional secondary sensor: camera bearing and range to the beacon.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VisionSample {
    pub bearing: Option<f64>,
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for ControllerGains {
    fn default() -> Self {
        Self { kp: 0.3, ki: 0.0, kd: 1.0 }
    }
}

impl ControllerGains {
    pub fn as_array(&self) -> [f64; 3] {
        [self.kp, self.ki, self.kd]
    }
}

/// Operator intent as last received over the command channel.
///
/// `arm_seq` is bumped on every arm/disarm command so a repeated request is
/// distinguishable from a stale one; 0 means no request yet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OperatorState {
    pub arm: bool,
    pub arm_seq: u64,
    pub gains: ControllerGains,
    pub thresholds: ValidityThresholds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_axes_and_buttons_read_neutral() {
        let js = JoystickState { axes: vec![0.5], buttons: vec![] };
        assert_eq!(js.axis(AXIS_OVERRIDE), 0.0);
        assert!(!js.button(BUTTON_ARM));
        assert!(!js.override_active());
    }

    #[test]
    fn override_requires_positive_trigger() {
        for trigger in [-1.0, -0.01, 0.0] {
            let js = JoystickState { axes: vec![1.0, -1.0, trigger], buttons: vec![true, false] };
            assert!(!js.override_active(), "trigger={}", trigger);
        }
        let js = JoystickState { axes: vec![0.0, 0.0, 0.01], buttons: vec![] };
        assert!(js.override_active());
    }

    #[test]
    fn nan_axis_is_neutral() {
        let js = JoystickState { axes: vec![f64::NAN, 0.0, f64::NAN], buttons: vec![] };
        assert_eq!(js.axis(AXIS_TURN), 0.0);
        assert!(!js.override_active());
    }

    #[test]
    fn weak_or_unconfident_bearing_is_invalid() {
        let th = ValidityThresholds { min_strength: 10.0, min_confidence: 5.0 };
        let base = BearingSample { raw: Some(30.0), bearing: Some(30.0), strength: 10.0, confidence: 5.0 };
        assert!(base.is_valid(&th));
        assert_eq!(base.valid_bearing(&th), Some(30.0));

        let weak = BearingSample { strength: 9.9, ..base };
        assert!(!weak.is_valid(&th));
        assert_eq!(weak.valid_bearing(&th), None);

        let unsure = BearingSample { confidence: 4.0, ..base };
        assert!(!unsure.is_valid(&th));

        assert!(!BearingSample::invalid().is_valid(&ValidityThresholds { min_strength: 0.0, min_confidence: 0.0 }));
    }
}
