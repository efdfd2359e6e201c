use serde::{Deserialize, Serialize};

pub const EFFORT_LIMIT: i32 = 1000;

/// Actuation command handed to the vehicle link every tick.
///
/// `pitch`: negative drives forward. `yaw`: negative turns clockwise, i.e.
/// toward a positive bearing. Both are clamped to +/-1000.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffortCommand {
    pub pitch: i32,
    pub yaw: i32,
}

impl EffortCommand {
    pub const NEUTRAL: EffortCommand = EffortCommand { pitch: 0, yaw: 0 };

    pub fn new(pitch: i32, yaw: i32) -> Self {
        Self {
            pitch: pitch.clamp(-EFFORT_LIMIT, EFFORT_LIMIT),
            yaw: yaw.clamp(-EFFORT_LIMIT, EFFORT_LIMIT),
        }
    }

    /// From normalized [-1, 1] values, truncated toward zero.
    pub fn from_unit(pitch: f64, yaw: f64) -> Self {
        let scale = EFFORT_LIMIT as f64;
        Self::new((pitch * scale) as i32, (yaw * scale) as i32)
    }

    pub fn is_neutral(&self) -> bool {
        self.pitch == 0 && self.yaw == 0
    }
}
