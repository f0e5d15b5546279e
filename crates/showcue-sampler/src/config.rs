//! Loop buffer node configuration.

use showcue_core::{EngineConfig, Pacing};
use std::time::Duration;

/// Per-node timing and I/O parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopBufferConfig {
    /// Length of each emitted chunk (default: 40 ms)
    pub chunk_duration: Duration,
    /// Bytes requested per upstream pull (default: 4096)
    pub pull_size: usize,
    /// Output pacing (default: real time)
    pub pacing: Pacing,
}

impl Default for LoopBufferConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_millis(40),
            pull_size: 4096,
            pacing: Pacing::RealTime,
        }
    }
}

impl LoopBufferConfig {
    /// Take the node-relevant subset of the engine configuration.
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            chunk_duration: config.chunk_duration,
            pull_size: config.pull_size,
            pacing: config.pacing,
        }
    }

    /// Default config with free-running output, for offline rendering and tests.
    pub fn with_free_pacing() -> Self {
        Self {
            pacing: Pacing::Free,
            ..Default::default()
        }
    }

    pub fn with_chunk_duration(duration: Duration) -> Self {
        Self {
            chunk_duration: duration.max(Duration::from_millis(1)),
            ..Default::default()
        }
    }

    pub fn chunk_nanos(&self) -> u64 {
        showcue_core::time::nanos(self.chunk_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoopBufferConfig::default();
        assert_eq!(config.chunk_duration, Duration::from_millis(40));
        assert_eq!(config.pull_size, 4096);
        assert_eq!(config.pacing, Pacing::RealTime);
        assert_eq!(config.chunk_nanos(), 40_000_000);
    }

    #[test]
    fn test_from_engine() {
        let engine = EngineConfig {
            pull_size: 1024,
            pacing: Pacing::Free,
            ..Default::default()
        };
        let config = LoopBufferConfig::from_engine(&engine);
        assert_eq!(config.pull_size, 1024);
        assert_eq!(config.pacing, Pacing::Free);
    }

    #[test]
    fn test_chunk_duration_floor() {
        let config = LoopBufferConfig::with_chunk_duration(Duration::ZERO);
        assert_eq!(config.chunk_duration, Duration::from_millis(1));
    }
}
