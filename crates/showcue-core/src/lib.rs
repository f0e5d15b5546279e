//! Core types shared by every showcue subsystem.
//!
//! - **format** - sample formats and the byte/time arithmetic used by the loop buffer
//! - **stream** - chunks, stream items and the `Downstream`/`PullSource` node seams
//! - **protocol** - voice control messages, notifications and the event channel
//! - **metering** - lock-free per-voice level tap (RMS, peak, decaying peak)
//! - **config** - engine-wide configuration

pub mod config;
pub mod error;
pub mod format;
pub mod lockfree;
pub mod metering;
pub mod protocol;
pub mod stream;
pub mod time;

pub use config::{EngineConfig, Pacing, ReadMode};
pub use error::{Error, Result};
pub use format::{AudioFormat, SampleFormat};
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicFloat};
pub use metering::{LevelMeter, StereoLevels};
pub use protocol::{
    event_channel, EventReceiver, EventSender, NotificationKind, RunId, VoiceControl,
    VoiceNotification,
};
pub use stream::{
    ChannelSink, Chunk, Downstream, MixBus, PullSource, StereoBlock, StreamItem,
};
pub use time::NANOS_PER_SECOND;

pub use std::sync::atomic::Ordering;
pub use std::sync::Arc;
