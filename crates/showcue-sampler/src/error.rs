//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Hound error.
    #[error("Hound error: {0}")]
    Hound(#[from] hound::Error),

    /// Core error.
    #[error(transparent)]
    Core(#[from] showcue_core::Error),

    /// File does not start with a RIFF header.
    #[error("Not a RIFF file")]
    NotRiff,

    /// RIFF form type is not WAVE.
    #[error("RIFF form is not WAVE")]
    NotWave,

    /// A `data` chunk appeared before any `fmt ` chunk.
    #[error("data chunk before fmt chunk")]
    MissingFormat,

    /// Encoding the engine cannot carry.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Header ended early.
    #[error("Truncated RIFF header")]
    Truncated,

    /// Format in the file differs from the format the voice was built for.
    #[error("Format mismatch: expected {expected:?}, found {found:?}")]
    FormatMismatch {
        expected: showcue_core::AudioFormat,
        found: showcue_core::AudioFormat,
    },

    /// Could not spawn a worker thread.
    #[error("Failed to spawn worker: {0}")]
    WorkerSpawn(String),

    /// `activate` called on a node that is already running.
    #[error("Node already active")]
    AlreadyActive,

    /// The node's worker has exited.
    #[error("Node is not running")]
    NotRunning,
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
