pub mod arbiter;
pub mod config;
pub mod doctor;
pub mod gate;
pub mod pid;

pub use arbiter::{ArbiterInputs, ControlArbiter, LinkAction, LinkView, TickOutput};
pub use config::{ControlConfig, PidConfig};
pub use gate::PeriodicGate;
pub use pid::HeadingController;
