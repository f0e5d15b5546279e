//! Loop buffer node: whole-clip buffering with byte-aligned looping.
//!
//! A voice's clip is captured into memory (read straight from a RIFF/WAVE file,
//! pulled from a decoder, or pushed in) and then emitted as fixed-length,
//! timestamped chunks, looping a marked region up to a limit and padding with
//! silence whenever the voice is idle, paused or drained.
//!
//! # Example
//!
//! ```ignore
//! use showcue_sampler::{Acquisition, LoopBufferConfig, LoopBufferNode, LoopSettings};
//!
//! let mut node = LoopBufferNode::new("bell", format, LoopSettings::default(), LoopBufferConfig::default())?;
//! node.activate(Acquisition::Direct("bell.wav".into()), Box::new(envelope))?;
//! node.control(VoiceControl::Start { run: RunId(1) })?;
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub mod loop_buffer;
pub mod node;
pub mod riff;
pub mod source;

pub use config::LoopBufferConfig;
pub use loop_buffer::{Cycle, LoopBuffer, LoopBufferStatus, LoopSettings};
pub use node::{Acquisition, LoopBufferNode, PushHandle};
pub use riff::RiffReader;
pub use source::{format_from_spec, probe_format, WavFileSource};
