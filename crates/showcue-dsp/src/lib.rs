//! Per-voice processing stages that sit after the loop buffer.
//!
//! - [`Envelope`] shapes volume through attack, decay, sustain and release,
//!   honours pause/continue and releases early on request. [`EnvelopeNode`]
//!   wraps it as a chain stage and publishes its notifications.
//! - [`PanGainNode`] applies the live volume and pan, converts to stereo and
//!   hands the block to the shared [`MixBus`](showcue_core::MixBus).

mod error;
pub use error::{Error, Result};

mod envelope;
pub use envelope::{Envelope, EnvelopeNode, EnvelopeParams, ReleaseDuration, Stage};

mod pan;
pub use pan::{pan_label, volume_label, PanGain, PanGainNode};
