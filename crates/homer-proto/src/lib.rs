pub mod effort;
pub mod messages;
pub mod state;
pub mod telemetry;

pub use effort::EffortCommand;
pub use state::{
    BearingSample, ControllerGains, JoystickState, OperatorState, ValidityThresholds, VisionSample,
};

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected packet type: {0}")]
    UnexpectedType(&'static str),
}

/// Signed bearing in (-180, 180] from a raw receiver angle in [0, 360).
///
/// `offset_deg` is the antenna mounting bias, subtracted before conversion.
pub fn signed_bearing(raw_deg: f64, offset_deg: f64) -> f64 {
    let r = (raw_deg - offset_deg).rem_euclid(360.0);
    if r > 180.0 { -(360.0 - r) } else { r }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearing_conversion_reference_points() {
        assert_eq!(signed_bearing(0.0, 0.0), 0.0);
        assert_eq!(signed_bearing(200.0, 0.0), -160.0);
        assert_eq!(signed_bearing(180.0, 0.0), 180.0);
        assert_eq!(signed_bearing(90.0, 0.0), 90.0);
        assert_eq!(signed_bearing(359.0, 0.0), -1.0);
    }

    #[test]
    fn bearing_conversion_stays_in_half_open_range() {
        let mut raw = 0.0;
        while raw < 360.0 {
            let b = signed_bearing(raw, 0.0);
            assert!(b > -180.0 && b <= 180.0, "raw={} gave {}", raw, b);
            raw += 0.5;
        }
    }

    #[test]
    fn bearing_offset_is_subtracted_before_conversion() {
        // 45 deg antenna bias: raw 45 means dead ahead
        assert_eq!(signed_bearing(45.0, 45.0), 0.0);
        assert_eq!(signed_bearing(10.0, 45.0), -35.0);
        assert_eq!(signed_bearing(225.0, 45.0), 180.0);
    }

    #[test]
    fn fractional_and_negative_inputs_wrap() {
        use approx::assert_relative_eq;
        assert_relative_eq!(signed_bearing(359.9, 0.0), -0.1, epsilon = 1e-9);
        assert_relative_eq!(signed_bearing(-30.0, 0.0), -30.0, epsilon = 1e-9);
        assert_relative_eq!(signed_bearing(12.5, 45.0), -32.5, epsilon = 1e-9);
    }
}
