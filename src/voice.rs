//! Voices: one persistent playback chain per sound.
//!
//! ```text
//! LoopBufferNode ──▶ EnvelopeNode ──▶ PanGainNode ──▶ MixBus
//!   (clip, loops)     (ADSR, events)   (gain, pan, meter)
//! ```
//!
//! A voice is built once at load time and idles emitting silence. Each start
//! tags a new [`RunId`] and rewinds the chain; releases and notifications
//! carry that run so anything addressed to an earlier cycle is recognisably
//! stale.

use crate::{Error, Result, SoundDefinition};
use showcue_core::{
    AudioFormat, EngineConfig, EventSender, LevelMeter, MixBus, ReadMode, RunId, StereoLevels,
    VoiceControl,
};
use showcue_dsp::{Envelope, EnvelopeNode, PanGain, PanGainNode};
use showcue_sampler::{
    probe_format, Acquisition, LoopBufferConfig, LoopBufferNode, LoopBufferStatus,
    WavFileSource,
};
use showcue_sequencer::{SoundPlayer, StartParams};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// How long `shutdown` waits for a voice's workers to wind down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Voice {
    definition: SoundDefinition,
    format: AudioFormat,
    node: LoopBufferNode,
    controls: Arc<PanGain>,
    meter: Arc<LevelMeter>,
    run: RunId,
}

impl Voice {
    /// Probe the sound's file, assemble the chain and start its workers.
    pub fn load(
        definition: SoundDefinition,
        config: &EngineConfig,
        events: EventSender,
        bus: Arc<dyn MixBus>,
    ) -> Result<Self> {
        definition.validate()?;
        let format = probe_format(&definition.wav_file)?;
        let name = definition.name.clone();

        let controls = Arc::new(PanGain::new(1.0, definition.designer_pan));
        let meter = Arc::new(LevelMeter::default());
        let output = PanGainNode::new(
            name.clone(),
            format,
            Arc::clone(&controls),
            Arc::clone(&meter),
            bus,
        );
        let envelope = Envelope::new(format, definition.envelope_params());
        let chain = EnvelopeNode::new(name.clone(), envelope, events, output);

        let mut node = LoopBufferNode::new(
            name,
            format,
            definition.loop_settings(),
            LoopBufferConfig::from_engine(config),
        )?;
        let acquisition = match config.read_mode {
            ReadMode::Direct => Acquisition::Direct(definition.wav_file.clone()),
            ReadMode::Decode => {
                Acquisition::Pull(Box::new(WavFileSource::open(&definition.wav_file)?))
            }
        };
        node.activate(acquisition, Box::new(chain))?;

        tracing::debug!(
            "Loaded {} from {:?} ({:?}, {} ch, {} Hz)",
            definition.name,
            definition.wav_file,
            format.sample_format,
            format.channels,
            format.rate
        );
        Ok(Self {
            definition,
            format,
            node,
            controls,
            meter,
            run: RunId::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &SoundDefinition {
        &self.definition
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// The run the latest start was tagged with.
    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn controls(&self) -> &PanGain {
        &self.controls
    }

    pub fn start(&mut self, params: &StartParams) -> Result<RunId> {
        let run = self.run.next();
        self.controls.set_volume(params.volume);
        self.controls
            .set_pan(params.pan.unwrap_or(self.definition.designer_pan));
        self.node.control(VoiceControl::Start { run })?;
        self.run = run;
        tracing::info!("{} started ({run})", self.definition.name);
        Ok(run)
    }

    /// Release the sound if `run` is still the current run.
    pub fn release(&mut self, run: RunId) {
        if run != self.run {
            tracing::debug!(
                "{}: ignoring release for {run}, current is {}",
                self.definition.name,
                self.run
            );
            return;
        }
        tracing::info!("{} releasing ({run})", self.definition.name);
        self.send(VoiceControl::Release);
    }

    pub fn pause(&mut self) {
        self.send(VoiceControl::Pause);
    }

    pub fn resume(&mut self) {
        self.send(VoiceControl::Continue);
    }

    fn send(&self, control: VoiceControl) {
        if let Err(err) = self.node.control(control) {
            tracing::warn!("{}: {:?} not delivered: {}", self.definition.name, control, err);
        }
    }

    pub fn levels(&self) -> StereoLevels {
        self.meter.levels()
    }

    pub fn snapshot(&self) -> LoopBufferStatus {
        self.node.snapshot()
    }

    pub fn is_active(&self) -> bool {
        self.node.is_active()
    }

    /// Send `Shutdown` and wait for the end marker to pass through.
    pub fn shutdown(&mut self) {
        if !self.node.is_active() {
            return;
        }
        self.send(VoiceControl::Shutdown);
        if !self.node.join(SHUTDOWN_TIMEOUT) {
            tracing::warn!("{}: workers did not stop in time", self.definition.name);
            self.node.deactivate();
        }
    }
}

/// Every loaded voice, keyed by sound name. Sounds that failed to load are
/// remembered with the reason so the host can report them.
#[derive(Default)]
pub struct VoiceBank {
    voices: HashMap<String, Voice>,
    disabled: Vec<(String, String)>,
}

impl VoiceBank {
    pub fn insert(&mut self, voice: Voice) {
        self.voices.insert(voice.name().to_string(), voice);
    }

    pub fn disable(&mut self, sound: impl Into<String>, reason: impl Into<String>) {
        self.disabled.push((sound.into(), reason.into()));
    }

    pub fn get(&self, sound: &str) -> Option<&Voice> {
        self.voices.get(sound)
    }

    pub fn get_mut(&mut self, sound: &str) -> Option<&mut Voice> {
        self.voices.get_mut(sound)
    }

    pub fn voice(&mut self, sound: &str) -> Result<&mut Voice> {
        self.voices
            .get_mut(sound)
            .ok_or_else(|| Error::UnknownSound(sound.to_string()))
    }

    pub fn contains(&self, sound: &str) -> bool {
        self.voices.contains_key(sound)
    }

    pub fn disabled(&self) -> &[(String, String)] {
        &self.disabled
    }

    pub fn is_disabled(&self, sound: &str) -> bool {
        self.disabled.iter().any(|(name, _)| name == sound)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.values()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn shutdown(&mut self) {
        for voice in self.voices.values_mut() {
            voice.shutdown();
        }
    }
}

impl SoundPlayer for VoiceBank {
    fn start(&mut self, sound: &str, params: &StartParams) -> showcue_sequencer::Result<RunId> {
        if self.is_disabled(sound) {
            return Err(showcue_sequencer::Error::Player(format!(
                "{sound} is disabled"
            )));
        }
        self.voice(sound)
            .and_then(|voice| voice.start(params))
            .map_err(|err| showcue_sequencer::Error::Player(err.to_string()))
    }

    fn release(&mut self, sound: &str, run: RunId) {
        match self.voices.get_mut(sound) {
            Some(voice) => voice.release(run),
            None => tracing::warn!("Release for unknown sound {sound}"),
        }
    }
}
