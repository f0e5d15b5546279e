//! Stream items and the seams between processing nodes.

use crate::protocol::VoiceControl;
use crate::{AudioFormat, Error, Result};
use crossbeam_channel::Sender;

/// A timestamped run of interleaved bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub data: Vec<u8>,
    /// Local-clock time of the first frame, in nanoseconds.
    pub timestamp: u64,
    /// Nanoseconds covered by `data`.
    pub duration: u64,
}

impl Chunk {
    pub fn new(data: Vec<u8>, timestamp: u64, duration: u64) -> Self {
        Self {
            data,
            timestamp,
            duration,
        }
    }

    /// `len` bytes of the format's silence value.
    pub fn silence(format: &AudioFormat, len: usize, timestamp: u64, duration: u64) -> Self {
        Self::new(
            vec![format.sample_format.silence_byte(); len],
            timestamp,
            duration,
        )
    }

    #[inline]
    pub fn frames(&self, format: &AudioFormat) -> usize {
        self.data.len() / format.frame_bytes()
    }
}

/// What travels down a voice chain.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Chunk(Chunk),
    /// A control message, forwarded in order after upstream acted on it.
    Control(VoiceControl),
    /// Upstream drained its buffer. Sent once per run.
    Completed,
    /// Teardown marker. Nothing follows it.
    EndOfStream,
}

/// The consuming side of a node.
pub trait Downstream: Send {
    fn push(&mut self, item: StreamItem) -> Result<()>;
}

impl Downstream for Box<dyn Downstream> {
    fn push(&mut self, item: StreamItem) -> Result<()> {
        (**self).push(item)
    }
}

/// A source that hands out bytes on request.
pub trait PullSource: Send {
    fn format(&self) -> AudioFormat;

    /// Whether `pull` may be called. Push-only sources return false.
    fn supports_pull(&self) -> bool {
        true
    }

    /// Read up to `len` bytes starting at byte `offset`. `None` is end of data.
    fn pull(&mut self, offset: u64, len: usize) -> Result<Option<Vec<u8>>>;
}

/// Forwards every item into a crossbeam channel.
pub struct ChannelSink {
    tx: Sender<StreamItem>,
}

impl ChannelSink {
    pub fn new(tx: Sender<StreamItem>) -> Self {
        Self { tx }
    }
}

impl Downstream for ChannelSink {
    fn push(&mut self, item: StreamItem) -> Result<()> {
        self.tx.send(item).map_err(|_| Error::ChannelClosed)
    }
}

/// Stereo frames produced by a voice's pan/gain stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoBlock {
    pub frames: Vec<(f32, f32)>,
    pub timestamp: u64,
    pub duration: u64,
}

/// The shared mix stage every voice delivers its stereo output to.
pub trait MixBus: Send + Sync {
    fn mix(&self, voice: &str, block: &StereoBlock);

    /// The voice's chain has been torn down.
    fn end_of_stream(&self, _voice: &str) {}
}
