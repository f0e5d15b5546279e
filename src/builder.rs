//! Builder for configuring and constructing a `ShowEngine`.

use crate::engine::{LogDisplay, NullBus};
use crate::voice::{Voice, VoiceBank};
use crate::{Error, Result, ShowEngine, SoundDefinition};
use showcue_core::{event_channel, EngineConfig, MixBus};
use showcue_sequencer::{OperatorDisplay, Script, SequenceItem, Sequencer};
use std::collections::HashSet;
use std::sync::Arc;

/// A sound whose file is missing or unreadable does not fail the build: it
/// is disabled, logged, and listed by [`ShowEngine::disabled_sounds`]. Starting
/// it later is refused like any other failed start.
///
/// # Example
///
/// ```ignore
/// use showcue::prelude::*;
///
/// let engine = ShowEngine::builder()
///     .sounds(vec![SoundDefinition::new("bell", "sounds/bell.wav")])
///     .script(vec![
///         SequenceItem::StartSequence { name: "begin".into(), next: Some("A".into()) },
///         StartSound::new("A", "bell").cluster(0).into(),
///     ])
///     .build()?;
///
/// engine.start_show()?;
/// ```
pub struct ShowEngineBuilder {
    config: EngineConfig,
    sounds: Vec<SoundDefinition>,
    script: Vec<SequenceItem>,
    mix_bus: Option<Arc<dyn MixBus>>,
    display: Option<Box<dyn OperatorDisplay>>,
}

impl Default for ShowEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            sounds: Vec::new(),
            script: Vec::new(),
            mix_bus: None,
            display: None,
        }
    }
}

impl ShowEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sounds(mut self, sounds: impl IntoIterator<Item = SoundDefinition>) -> Self {
        self.sounds.extend(sounds);
        self
    }

    pub fn sound(mut self, sound: SoundDefinition) -> Self {
        self.sounds.push(sound);
        self
    }

    pub fn script(mut self, items: impl IntoIterator<Item = SequenceItem>) -> Self {
        self.script.extend(items);
        self
    }

    /// Default: a bus that discards audio
    pub fn mix_bus(mut self, bus: Arc<dyn MixBus>) -> Self {
        self.mix_bus = Some(bus);
        self
    }

    /// Default: a display that logs through `tracing`
    pub fn display(mut self, display: impl OperatorDisplay + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    pub fn build(self) -> Result<ShowEngine> {
        self.config.validate()?;
        let script = Script::new(self.script)?;

        let mut names = HashSet::new();
        for sound in &self.sounds {
            if !names.insert(sound.name.as_str()) {
                return Err(Error::DuplicateSound(sound.name.clone()));
            }
        }

        let bus = self.mix_bus.unwrap_or_else(|| Arc::new(NullBus));
        let (events_tx, events_rx) = event_channel();

        let mut voices = VoiceBank::default();
        for definition in self.sounds {
            let name = definition.name.clone();
            match Voice::load(definition, &self.config, events_tx.clone(), Arc::clone(&bus)) {
                Ok(voice) => voices.insert(voice),
                Err(err) => {
                    tracing::warn!("Sound {name} disabled: {err}");
                    voices.disable(name, err.to_string());
                }
            }
        }
        drop(events_tx);

        for item in script.iter() {
            if let SequenceItem::StartSound(start) = item {
                if !voices.contains(&start.sound) && !voices.is_disabled(&start.sound) {
                    tracing::warn!(
                        "Sequence item {} starts undefined sound {}",
                        start.name,
                        start.sound
                    );
                }
            }
        }

        tracing::info!(
            "Show loaded: {} sounds, {} disabled, {} sequence items",
            voices.len(),
            voices.disabled().len(),
            script.len()
        );

        let sequencer = Sequencer::new(script, self.config.cluster_count);
        let display = self.display.unwrap_or_else(|| Box::new(LogDisplay));
        Ok(ShowEngine::from_parts(
            self.config,
            sequencer,
            voices,
            events_rx,
            display,
        ))
    }
}
