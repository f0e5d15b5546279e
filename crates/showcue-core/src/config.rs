//! Engine configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a voice's push worker spaces its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Pacing {
    /// Sleep until each chunk's local-clock deadline.
    #[default]
    RealTime,
    /// Emit buffered data back-to-back; only silence is paced.
    Free,
}

/// How sound files reach the loop buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadMode {
    /// The loop buffer parses the RIFF container itself.
    #[default]
    Direct,
    /// A decoder upstream is pulled on demand.
    Decode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of operator-facing clusters.
    pub cluster_count: usize,
    /// Duration of each chunk the loop buffer emits.
    pub chunk_duration: Duration,
    /// Bytes requested per upstream pull.
    pub pull_size: usize,
    /// Period of the display refresh / Wait expiry tick.
    pub display_refresh: Duration,
    pub pacing: Pacing,
    pub read_mode: ReadMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cluster_count: 16,
            chunk_duration: Duration::from_millis(40),
            pull_size: 4096,
            display_refresh: Duration::from_millis(100),
            pacing: Pacing::RealTime,
            read_mode: ReadMode::Direct,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cluster_count == 0 {
            return Err(Error::InvalidConfig("cluster_count must be at least 1".into()));
        }
        if self.chunk_duration.is_zero() || self.chunk_duration > Duration::from_secs(1) {
            return Err(Error::InvalidConfig(format!(
                "chunk_duration {:?} out of range (0-1s]",
                self.chunk_duration
            )));
        }
        if self.pull_size == 0 {
            return Err(Error::InvalidConfig("pull_size must be non-zero".into()));
        }
        if self.display_refresh.is_zero() {
            return Err(Error::InvalidConfig("display_refresh must be non-zero".into()));
        }
        Ok(())
    }
}
