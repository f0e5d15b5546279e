//! Error types for showcue-core.

use thiserror::Error;

/// Error type for showcue-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    #[error("Invalid loop range: loop_to={start}, loop_from={end}")]
    InvalidLoopRange { start: u64, end: u64 },

    #[error("Upstream source failed: {0}")]
    Source(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
