//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A `next` reference names no item in the script.
    #[error("Sequence item {0} not found")]
    UnknownItem(String),

    /// Two items share a name.
    #[error("Duplicate sequence item name: {0}")]
    DuplicateItem(String),

    /// A chain of items came back to one it had already run.
    #[error("Sequence item {0} reached twice in one step")]
    Cycle(String),

    /// The script has no Start Sequence item.
    #[error("Script has no Start Sequence item")]
    NoStartSequence,

    /// Cluster is playing a sound that is not releasing.
    #[error("Cluster {0} is busy")]
    ClusterBusy(usize),

    /// Every cluster is playing a sound.
    #[error("No free cluster")]
    NoFreeCluster,

    #[error("Cluster {0} does not exist")]
    InvalidCluster(usize),

    /// The sound player refused to start a sound.
    #[error("Player: {0}")]
    Player(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
