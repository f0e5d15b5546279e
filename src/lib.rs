//! # showcue - Theatre Sound-Effects Engine
//!
//! Plays a show's sound effects under the control of a cue script and a
//! human operator.
//!
//! ## Architecture
//!
//! showcue is an umbrella crate that coordinates:
//! - **showcue-core** - Formats, stream seams, voice control protocol, metering
//! - **showcue-sampler** - Loop buffer node (whole-clip buffering, looping, paced output)
//! - **showcue-dsp** - ADSR envelope and pan/gain stage
//! - **showcue-sequencer** - Cue script interpreter, clusters, operator display arbitration
//!
//! Every sound gets one persistent voice (loop buffer, envelope, pan/gain)
//! running on its own worker threads. The sequencer starts and releases
//! voices as the script, the operator and remote commands direct, and follows
//! the script's branches when voices report completion or release.
//!
//! ## Quick Start
//!
//! ```ignore
//! use showcue::prelude::*;
//!
//! let mut engine = ShowEngine::builder()
//!     .sound(SoundDefinition::new("bell", "sounds/bell.wav"))
//!     .script(vec![
//!         SequenceItem::StartSequence { name: "begin".into(), next: Some("A".into()) },
//!         StartSound::new("A", "bell").cluster(0).next_completion("Z").into(),
//!         SequenceItem::OperatorWait {
//!             name: "Z".into(),
//!             text: "Bell done".into(),
//!             next: None,
//!             next_play: None,
//!         },
//!     ])
//!     .build()?;
//!
//! engine.start_show()?;
//! engine.run_for(Duration::from_secs(5))?;
//! engine.shutdown();
//! ```

pub mod builder;
pub mod definition;
pub mod engine;
pub mod error;
pub mod voice;

pub use builder::ShowEngineBuilder;
pub use definition::{SoundDefinition, Trigger, Triggers};
pub use engine::{LogDisplay, NullBus, RemoteCommand, ShowEngine};
pub use error::{Error, Result};
pub use voice::{Voice, VoiceBank};

/// Re-export of showcue-core for direct access
pub use showcue_core as core;
pub use showcue_dsp as dsp;
pub use showcue_sampler as sampler;
pub use showcue_sequencer as sequencer;

pub use showcue_core::{
    EngineConfig, LevelMeter, MixBus, NotificationKind, Pacing, ReadMode, RunId, StereoBlock,
    StereoLevels, VoiceControl, VoiceNotification,
};
pub use showcue_dsp::{pan_label, volume_label, EnvelopeParams, ReleaseDuration};
pub use showcue_sampler::{LoopBufferStatus, LoopSettings};
pub use showcue_sequencer::{
    OperatorDisplay, RecordId, Script, SequenceItem, Sequencer, StartParams, StartSound,
};

/// Everything a host needs to build and drive a show.
pub mod prelude {
    pub use crate::{
        EngineConfig, Error, LogDisplay, MixBus, NullBus, OperatorDisplay, Pacing, ReadMode,
        RecordId, RemoteCommand, Result, SequenceItem, ShowEngine, ShowEngineBuilder,
        SoundDefinition, StartSound, StereoBlock, Trigger, Triggers,
    };
    pub use std::sync::Arc;
    pub use std::time::Duration;
}
