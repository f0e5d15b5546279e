//! Centralized error type for the showcue umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] showcue_core::Error),

    #[error("Sampler: {0}")]
    Sampler(#[from] showcue_sampler::Error),

    #[error("DSP: {0}")]
    Dsp(#[from] showcue_dsp::Error),

    #[error("Sequencer: {0}")]
    Sequencer(#[from] showcue_sequencer::Error),

    #[error("Unknown sound: {0}")]
    UnknownSound(String),

    #[error("Duplicate sound definition: {0}")]
    DuplicateSound(String),

    #[error("No sound bound to {0}")]
    UnboundTrigger(String),
}

pub type Result<T> = std::result::Result<T, Error>;
