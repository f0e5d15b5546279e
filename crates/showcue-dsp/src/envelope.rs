//! ADSR envelope with pause and early release.
//!
//! Volume is a function of the frame's stream time
//! `t = timestamp - base_time - pause_time`, where `base_time` is the
//! timestamp of the first chunk after a start and `pause_time` is the total
//! time spent paused. The envelope moves through attack, decay and sustain,
//! then ramps down over the release duration once either the configured
//! release-start time is reached or a `Release` control arrives. The release
//! ramp begins from the last computed phase volume, so releasing early never
//! jumps.
//!
//! When the chain upstream reports that it has drained, the envelope
//! completes immediately. A completed envelope recycles itself so the voice
//! can be started again, unless it autostarts.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use showcue_core::{
    AudioFormat, Chunk, Downstream, EventSender, NotificationKind, RunId, StreamItem,
    VoiceControl, VoiceNotification,
};
use std::fmt;
use std::str::FromStr;

/// How long the release stage lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseDuration {
    /// Nanoseconds.
    Finite(u64),
    /// Hold the release-start volume until upstream completes.
    Infinite,
}

impl ReleaseDuration {
    pub fn is_infinite(self) -> bool {
        matches!(self, ReleaseDuration::Infinite)
    }
}

impl Default for ReleaseDuration {
    fn default() -> Self {
        ReleaseDuration::Finite(0)
    }
}

impl FromStr for ReleaseDuration {
    type Err = Error;

    /// Nanoseconds, or `∞` for an infinite release.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "∞" || s.eq_ignore_ascii_case("inf") || s.eq_ignore_ascii_case("infinite") {
            return Ok(ReleaseDuration::Infinite);
        }
        s.parse::<u64>()
            .map(ReleaseDuration::Finite)
            .map_err(|_| Error::InvalidParameter(format!("release duration {s:?}")))
    }
}

impl fmt::Display for ReleaseDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseDuration::Finite(ns) => write!(f, "{ns}"),
            ReleaseDuration::Infinite => f.write_str("∞"),
        }
    }
}

/// Envelope shape. Times are nanoseconds of stream time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeParams {
    pub attack_duration: u64,
    pub attack_level: f64,
    pub decay_duration: u64,
    pub sustain_level: f64,
    /// Stream time at which the release begins on its own. 0 sustains until released.
    pub release_start: u64,
    pub release_duration: ReleaseDuration,
    /// Note volume applied on top of the phase volume.
    pub volume: f64,
    /// Run without waiting for a `Start` control.
    pub autostart: bool,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            attack_duration: 0,
            attack_level: 1.0,
            decay_duration: 0,
            sustain_level: 1.0,
            release_start: 0,
            release_duration: ReleaseDuration::default(),
            volume: 1.0,
            autostart: false,
        }
    }
}

impl EnvelopeParams {
    pub fn validate(&self) -> Result<()> {
        for (name, level) in [
            ("attack_level", self.attack_level),
            ("sustain_level", self.sustain_level),
            ("volume", self.volume),
        ] {
            if !level.is_finite() || level < 0.0 {
                return Err(Error::InvalidParameter(format!("{name} = {level}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    Attack,
    Decay,
    Sustain,
    Release,
    Completed,
    Paused,
}

pub struct Envelope {
    params: EnvelopeParams,
    format: AudioFormat,
    run: RunId,
    stage: Stage,

    running: bool,
    start_pending: bool,
    base_time: u64,

    pause_requested: bool,
    continue_requested: bool,
    pausing: bool,
    pause_start: u64,
    pause_time: u64,

    release_requested: bool,
    release_started: bool,
    release_started_time: u64,
    release_started_volume: f64,
    completed: bool,

    /// Phase volume of the most recent frame, before the note volume.
    last_volume: f64,

    release_posted: bool,
    completion_posted: bool,
    pending: Vec<NotificationKind>,
}

impl Envelope {
    pub fn new(format: AudioFormat, params: EnvelopeParams) -> Self {
        Self {
            params,
            format,
            run: RunId::default(),
            stage: Stage::NotStarted,
            running: false,
            start_pending: false,
            base_time: 0,
            pause_requested: false,
            continue_requested: false,
            pausing: false,
            pause_start: 0,
            pause_time: 0,
            release_requested: false,
            release_started: false,
            release_started_time: 0,
            release_started_volume: 0.0,
            completed: false,
            last_volume: 0.0,
            release_posted: false,
            completion_posted: false,
            pending: Vec::new(),
        }
    }

    pub fn params(&self) -> &EnvelopeParams {
        &self.params
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn last_volume(&self) -> f64 {
        self.last_volume
    }

    /// Run of the most recent `Start`.
    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Controls take effect from the next chunk.
    pub fn handle_control(&mut self, control: &VoiceControl) {
        match *control {
            VoiceControl::Start { run } => {
                if self.running {
                    tracing::debug!("Envelope restarted at {:?} for {}", self.stage, run);
                    self.recycle();
                }
                self.run = run;
                self.start_pending = true;
                self.release_requested = false;
                self.pause_requested = false;
                self.continue_requested = false;
            }
            VoiceControl::Pause => {
                if self.running || self.start_pending {
                    self.pause_requested = true;
                    self.continue_requested = false;
                }
            }
            VoiceControl::Continue => {
                if self.pause_requested {
                    self.continue_requested = true;
                }
            }
            VoiceControl::Release => {
                if self.running || self.start_pending {
                    self.release_requested = true;
                }
            }
            VoiceControl::Shutdown => {}
        }
    }

    /// Scale every sample of `chunk` in place.
    pub fn process(&mut self, chunk: &mut Chunk) {
        self.begin_chunk(chunk.timestamp);

        let sample = self.format.sample_format;
        let width = sample.bytes();
        let interval = self.format.frame_interval();
        let note_volume = self.params.volume;

        for (i, frame) in chunk
            .data
            .chunks_exact_mut(self.format.frame_bytes())
            .enumerate()
        {
            let ts = chunk.timestamp + (i as f64 * interval) as u64;
            let gain = self.advance(self.stream_time(ts)) * note_volume;
            if gain == 1.0 {
                continue;
            }
            for bytes in frame.chunks_exact_mut(width) {
                let value = sample.read_sample(bytes);
                sample.write_sample(value * gain, bytes);
            }
        }

        self.settle();
    }

    /// Upstream has drained: the sound is over whatever stage it was in.
    pub fn completed_upstream(&mut self) {
        if !self.running || self.completed {
            return;
        }
        tracing::debug!("Upstream completed during {:?}", self.stage);
        self.completed = true;
        self.stage = Stage::Completed;
        self.settle();
    }

    /// Notifications raised since the last call, each at most once per run.
    pub fn take_notifications(&mut self) -> Vec<NotificationKind> {
        std::mem::take(&mut self.pending)
    }

    fn begin_chunk(&mut self, ts: u64) {
        if !self.running && (self.start_pending || self.params.autostart) {
            self.running = true;
            self.start_pending = false;
            self.base_time = ts;
            self.pausing = false;
            self.pause_time = 0;
            tracing::debug!("Envelope started for {}, base time {}", self.run, ts);
        }
        if !self.running {
            return;
        }

        if self.pause_requested && !self.pausing {
            self.pausing = true;
            self.pause_start = ts;
        }
        if self.pausing && self.continue_requested {
            self.pause_time += ts.saturating_sub(self.pause_start);
            self.pausing = false;
            self.pause_requested = false;
            self.continue_requested = false;
        }
    }

    #[inline]
    fn stream_time(&self, ts: u64) -> u64 {
        ts.saturating_sub(self.base_time)
            .saturating_sub(self.pause_time)
    }

    /// Phase volume at stream time `t`.
    fn advance(&mut self, t: u64) -> f64 {
        if !self.running {
            self.stage = Stage::NotStarted;
            return 0.0;
        }
        if self.completed {
            return 0.0;
        }
        if self.pausing {
            self.stage = Stage::Paused;
            return 0.0;
        }

        let p = self.params;
        let attack_end = p.attack_duration;
        let decay_end = attack_end.saturating_add(p.decay_duration);

        let volume = if self.release_requested {
            self.release_ramp(t, t)
        } else if t < attack_end {
            self.stage = Stage::Attack;
            p.attack_level * t as f64 / attack_end as f64
        } else if t < decay_end {
            self.stage = Stage::Decay;
            let fraction = (t - attack_end) as f64 / p.decay_duration as f64;
            p.attack_level + (p.sustain_level - p.attack_level) * fraction
        } else if p.release_start == 0 || t < p.release_start {
            self.stage = Stage::Sustain;
            p.sustain_level
        } else {
            self.release_ramp(t, p.release_start)
        };

        if !self.completed {
            self.last_volume = volume;
        }
        volume
    }

    /// Release stage. The first call latches the starting point at `from`.
    fn release_ramp(&mut self, t: u64, from: u64) -> f64 {
        if !self.release_started {
            self.release_started = true;
            self.release_started_time = from;
            self.release_started_volume = self.last_volume;
            tracing::debug!(
                "Release of {} from volume {:.3} at {}",
                self.run,
                self.release_started_volume,
                from
            );
        }
        let elapsed = t.saturating_sub(self.release_started_time);
        match self.params.release_duration {
            ReleaseDuration::Infinite => {
                self.stage = Stage::Release;
                self.release_started_volume
            }
            ReleaseDuration::Finite(duration) if elapsed < duration => {
                self.stage = Stage::Release;
                self.release_started_volume * (1.0 - elapsed as f64 / duration as f64)
            }
            ReleaseDuration::Finite(_) => {
                self.completed = true;
                self.stage = Stage::Completed;
                0.0
            }
        }
    }

    /// Raise pending notifications and recycle a completed envelope.
    fn settle(&mut self) {
        if self.running && self.release_started && !self.release_posted {
            tracing::info!("{} entered its release stage", self.run);
            self.release_posted = true;
            self.pending.push(NotificationKind::ReleaseStarted);
        }
        if self.completed && !self.completion_posted {
            tracing::info!("{} completed", self.run);
            self.completion_posted = true;
            self.pending.push(NotificationKind::Completed);
        }
        if self.completed && !self.params.autostart {
            self.recycle();
        }
    }

    fn recycle(&mut self) {
        self.running = false;
        self.completed = false;
        self.release_started = false;
        self.release_requested = false;
        self.pausing = false;
        self.pause_requested = false;
        self.continue_requested = false;
        self.base_time = 0;
        self.last_volume = 0.0;
        self.release_posted = false;
        self.completion_posted = false;
        self.stage = Stage::NotStarted;
    }
}

/// Chain stage that applies an [`Envelope`] and reports its notifications.
pub struct EnvelopeNode<D> {
    sound: String,
    envelope: Envelope,
    events: EventSender,
    next: D,
}

impl<D: Downstream> EnvelopeNode<D> {
    pub fn new(sound: impl Into<String>, envelope: Envelope, events: EventSender, next: D) -> Self {
        Self {
            sound: sound.into(),
            envelope,
            events,
            next,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn publish(&mut self) {
        let run = self.envelope.run();
        for kind in self.envelope.take_notifications() {
            self.events.send(VoiceNotification {
                sound: self.sound.clone(),
                run,
                kind,
            });
        }
    }
}

impl<D: Downstream> Downstream for EnvelopeNode<D> {
    fn push(&mut self, item: StreamItem) -> showcue_core::Result<()> {
        match item {
            StreamItem::Chunk(mut chunk) => {
                self.envelope.process(&mut chunk);
                self.publish();
                tracing::trace!(
                    "{}: {:?} at volume {:.3}",
                    self.sound,
                    self.envelope.stage(),
                    self.envelope.last_volume()
                );
                self.next.push(StreamItem::Chunk(chunk))
            }
            StreamItem::Control(control) => {
                self.envelope.handle_control(&control);
                self.next.push(StreamItem::Control(control))
            }
            StreamItem::Completed => {
                self.envelope.completed_upstream();
                self.publish();
                self.next.push(StreamItem::Completed)
            }
            StreamItem::EndOfStream => self.next.push(StreamItem::EndOfStream),
        }
    }
}
