use anyhow::Result;

use crate::{Backend, LinkConfig};

pub fn check_link(c: &LinkConfig) -> Result<()> {
    if c.autodetect() {
        anyhow::ensure!(c.backend == Backend::Mavlink, "link.autodetect only works with the mavlink backend");
        if let Some(devs) = &c.candidate_devs {
            anyhow::ensure!(!devs.is_empty(), "link.candidate_devs is empty");
        }
        if let Some(bauds) = &c.candidate_bauds {
            anyhow::ensure!(!bauds.is_empty(), "link.candidate_bauds is empty");
        }
    } else {
        anyhow::ensure!(c.serial_dev.is_some(), "link.serial_dev missing (or enable link.autodetect)");
    }
    anyhow::ensure!(c.baud() > 0, "link.baud must be positive");
    anyhow::ensure!(c.policy().ack_timeout.as_millis() >= 50, "link.ack_timeout_ms too small");
    anyhow::ensure!((1..=1000).contains(&c.poll().as_millis()), "link.poll_ms should be 1..1000");
    Ok(())
}
