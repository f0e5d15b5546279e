//! Loop buffer state machine.
//!
//! Holds an entire clip in memory and hands it out one chunk per cycle from a
//! drain offset, looping a marked region on the way. The threaded wrapper in
//! [`crate::node`] owns one of these and feeds it acquired bytes and control
//! messages; everything here is synchronous so it can be tested cycle by cycle.
//!
//! Loop bounds are authored as stream times and converted to byte offsets on
//! whole-frame boundaries: the loop end (`loop_from`) rounds up and the loop
//! start (`loop_to`) rounds down, so the realised loop can be up to one frame
//! longer than authored.

use serde::{Deserialize, Serialize};
use showcue_core::{AudioFormat, Chunk, Error as CoreError, RunId, VoiceControl};

/// Authored loop and range parameters, all times in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSettings {
    /// Loop start: where playback jumps back to.
    pub loop_to: u64,
    /// Loop end: reaching it triggers a jump. 0 disables looping.
    pub loop_from: u64,
    /// Maximum number of loop-backs. 0 means unlimited.
    pub loop_limit: u32,
    /// Buffer at most this much of the clip. 0 means the whole clip.
    pub max_duration: u64,
    /// Where each run starts playing.
    pub start_time: u64,
    /// Behave as if `start` arrived at activation.
    pub autostart: bool,
}

impl LoopSettings {
    /// Reject a loop whose end comes before its start. An end of 0 disables looping.
    pub fn validate(&self) -> showcue_core::Result<()> {
        if self.loop_from != 0 && self.loop_from < self.loop_to {
            return Err(CoreError::InvalidLoopRange {
                start: self.loop_to,
                end: self.loop_from,
            });
        }
        Ok(())
    }
}

/// What one push cycle produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Cycle {
    Data(Chunk),
    /// `completed` is set on the first silent cycle after the drain limit.
    Silence { chunk: Chunk, completed: bool },
    EndOfStream,
}

/// Point-in-time view for queries from other threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopBufferStatus {
    pub run: RunId,
    pub buffer_len: usize,
    pub buffer_filled: bool,
    pub drain_level: usize,
    pub loop_counter: u32,
    pub started: bool,
    pub paused: bool,
    pub released: bool,
    pub completed: bool,
    pub local_clock: u64,
}

pub struct LoopBuffer {
    format: AudioFormat,
    settings: LoopSettings,
    chunk_bytes: usize,
    cap: Option<usize>,
    buffer: Vec<u8>,
    buffer_filled: bool,
    loop_start: usize,
    loop_end: usize,
    start_offset: usize,
    drain_level: usize,
    loop_counter: u32,
    local_clock: u64,
    run: RunId,
    started: bool,
    paused: bool,
    released: bool,
    completion_sent: bool,
    shutdown: bool,
}

impl LoopBuffer {
    pub fn new(format: AudioFormat, settings: LoopSettings, chunk_duration: u64) -> Self {
        let cap = (settings.max_duration > 0)
            .then(|| format.time_to_bytes_floor(settings.max_duration) as usize);
        let start_offset = format.time_to_bytes_floor(settings.start_time) as usize;
        Self {
            format,
            settings,
            chunk_bytes: format.chunk_bytes(chunk_duration),
            cap,
            buffer: Vec::new(),
            buffer_filled: false,
            loop_start: format.time_to_bytes_floor(settings.loop_to) as usize,
            loop_end: format.time_to_bytes_ceil(settings.loop_from) as usize,
            start_offset,
            drain_level: start_offset,
            loop_counter: 0,
            local_clock: 0,
            run: RunId::default(),
            started: settings.autostart,
            paused: false,
            released: false,
            completion_sent: false,
            shutdown: false,
        }
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Append acquired bytes, up to the max-duration cap.
    ///
    /// Returns how many bytes were kept. Once the buffer is marked filled
    /// everything is discarded, whichever acquisition path it came from.
    pub fn accept(&mut self, data: &[u8]) -> usize {
        if self.buffer_filled {
            tracing::debug!("Buffer already filled, discarding {} bytes", data.len());
            return 0;
        }
        let room = match self.cap {
            Some(cap) => cap.saturating_sub(self.buffer.len()),
            None => usize::MAX,
        };
        let take = data.len().min(room);
        self.buffer.extend_from_slice(&data[..take]);
        take
    }

    /// Whether the cap has been reached.
    pub fn at_cap(&self) -> bool {
        self.cap.is_some_and(|cap| self.buffer.len() >= cap)
    }

    /// Mark buffering complete. True only the first time.
    pub fn finish_buffering(&mut self) -> bool {
        if self.buffer_filled {
            return false;
        }
        let frame = self.format.frame_bytes();
        let whole = self.buffer.len() - self.buffer.len() % frame;
        self.buffer.truncate(whole);
        self.buffer_filled = true;
        tracing::debug!(
            "Buffering finished: {} bytes ({} ms)",
            whole,
            self.format.bytes_to_time(whole as u64) / 1_000_000
        );
        true
    }

    pub fn handle_control(&mut self, control: &VoiceControl) {
        match *control {
            VoiceControl::Start { run } => {
                self.run = run;
                self.drain_level = self.start_offset;
                self.loop_counter = 0;
                self.started = true;
                self.paused = false;
                self.released = false;
                self.completion_sent = false;
            }
            VoiceControl::Pause => {
                if self.started {
                    self.paused = true;
                }
            }
            VoiceControl::Continue => self.paused = false,
            VoiceControl::Release => self.released = true,
            VoiceControl::Shutdown => self.shutdown = true,
        }
    }

    fn doing_loops(&self) -> bool {
        self.loop_end > self.loop_start
            && !self.released
            && (self.settings.loop_limit == 0 || self.loop_counter < self.settings.loop_limit)
    }

    /// Produce the next chunk.
    pub fn next_cycle(&mut self) -> Cycle {
        if self.shutdown {
            return Cycle::EndOfStream;
        }

        let drained = self.buffer_filled && self.drain_level >= self.buffer.len();
        if !self.started || self.paused || !self.buffer_filled || drained {
            let completed = self.started && !self.paused && drained && !self.completion_sent;
            if completed {
                self.completion_sent = true;
                tracing::debug!(
                    "{} drained after {} loop(s)",
                    self.run,
                    self.loop_counter
                );
            }
            let duration = self.format.bytes_to_time(self.chunk_bytes as u64);
            let chunk = Chunk::silence(&self.format, self.chunk_bytes, self.local_clock, duration);
            self.local_clock += duration;
            return Cycle::Silence { chunk, completed };
        }

        if self.drain_level == self.loop_end && self.doing_loops() {
            self.drain_level = self.loop_start;
            self.loop_counter += 1;
            tracing::debug!(
                "{} looped back to byte {} (pass {})",
                self.run,
                self.loop_start,
                self.loop_counter + 1
            );
        }

        let mut len = self.chunk_bytes.min(self.buffer.len() - self.drain_level);
        if self.doing_loops() && self.drain_level < self.loop_end {
            len = len.min(self.loop_end - self.drain_level);
        }
        let data = self.buffer[self.drain_level..self.drain_level + len].to_vec();
        let duration = self.format.bytes_to_time(len as u64);
        let chunk = Chunk::new(data, self.local_clock, duration);
        self.drain_level += len;
        self.local_clock += duration;
        tracing::trace!("{} emitted {} bytes at {} ns", self.run, len, chunk.timestamp);
        Cycle::Data(chunk)
    }

    pub fn is_buffer_filled(&self) -> bool {
        self.buffer_filled
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown
    }

    pub fn drain_level(&self) -> usize {
        self.drain_level
    }

    pub fn loop_counter(&self) -> u32 {
        self.loop_counter
    }

    pub fn local_clock(&self) -> u64 {
        self.local_clock
    }

    /// Loop start and end as frame-aligned byte offsets.
    pub fn rounded_loop_bounds(&self) -> (usize, usize) {
        (self.loop_start, self.loop_end)
    }

    pub fn status(&self) -> LoopBufferStatus {
        LoopBufferStatus {
            run: self.run,
            buffer_len: self.buffer.len(),
            buffer_filled: self.buffer_filled,
            drain_level: self.drain_level,
            loop_counter: self.loop_counter,
            started: self.started,
            paused: self.paused,
            released: self.released,
            completed: self.completion_sent,
            local_clock: self.local_clock,
        }
    }
}
