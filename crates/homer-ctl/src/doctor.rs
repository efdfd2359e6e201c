use anyhow::Result;
use homer_proto::effort::EFFORT_LIMIT;
use homer_proto::ValidityThresholds;

use crate::config::{ControlConfig, PidConfig};

pub fn check_control(c: &ControlConfig) -> Result<()> {
    let tick = c.tick().as_millis();
    anyhow::ensure!((10..=1000).contains(&tick), "control.tick_ms should be 10..1000");
    let tol = c.tolerance_deg();
    anyhow::ensure!(tol > 0.0 && tol < 180.0, "control.setpoint_tolerance_deg must be in (0, 180)");
    anyhow::ensure!(
        c.setpoint_reached_wait_s.unwrap_or(3.0) >= 0.0,
        "control.setpoint_reached_wait_s must not be negative"
    );
    anyhow::ensure!(
        (0..=EFFORT_LIMIT).contains(&c.forward_speed()),
        "control.forward_speed must be 0..{}", EFFORT_LIMIT
    );
    anyhow::ensure!(
        (0..=EFFORT_LIMIT).contains(&c.yaw_speed()),
        "control.yaw_speed must be 0..{}", EFFORT_LIMIT
    );
    if let Some(m) = c.near_field_m {
        anyhow::ensure!(m > 0.0, "control.near_field_m must be positive");
    }
    Ok(())
}

pub fn check_pid(p: &PidConfig) -> Result<()> {
    let g = p.gains();
    anyhow::ensure!(
        g.kp.is_finite() && g.ki.is_finite() && g.kd.is_finite(),
        "pid gains must be finite"
    );
    anyhow::ensure!(p.output_limit() > 0.0, "pid.output_limit must be positive");
    anyhow::ensure!(p.output_scale() > 0.0, "pid.output_scale must be positive");
    Ok(())
}

pub fn check_thresholds(th: &ValidityThresholds) -> Result<()> {
    anyhow::ensure!(th.min_strength >= 0.0, "compass.min_strength must not be negative");
    anyhow::ensure!(th.min_confidence >= 0.0, "compass.min_confidence must not be negative");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        check_control(&ControlConfig::default()).unwrap();
        check_pid(&PidConfig::default()).unwrap();
        check_thresholds(&ValidityThresholds::default()).unwrap();
    }

    #[test]
    fn rejects_out_of_range_values() {
        let c = ControlConfig { setpoint_tolerance_deg: Some(180.0), ..Default::default() };
        assert!(check_control(&c).is_err());
        let c = ControlConfig { forward_speed: Some(1500), ..Default::default() };
        assert!(check_control(&c).is_err());
        let p = PidConfig { output_limit: Some(0.0), ..Default::default() };
        assert!(check_pid(&p).is_err());
        assert!(check_thresholds(&ValidityThresholds { min_strength: -1.0, min_confidence: 0.0 }).is_err());
    }
}
