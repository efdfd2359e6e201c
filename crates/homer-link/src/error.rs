use std::io;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("{} not acknowledged after {attempts} attempt(s)", if *.requested { "arm" } else { "disarm" })]
    NotAcknowledged { requested: bool, attempts: u32 },

    #[error("link i/o: {0}")]
    Io(#[from] io::Error),

    #[error("link protocol: {0}")]
    Protocol(String),

    #[error("link closed")]
    Closed,
}
