//! Sound definitions: what the designer authored for each sound effect.
//!
//! A definition is plain data. The host reads it from whatever project format
//! it uses and hands it to [`ShowEngineBuilder`](crate::ShowEngineBuilder),
//! which turns each one into a voice.

use crate::Result;
use serde::{Deserialize, Serialize};
use showcue_core::time::nanos;
use showcue_dsp::{EnvelopeParams, ReleaseDuration};
use showcue_sampler::LoopSettings;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundDefinition {
    pub name: String,
    pub wav_file: PathBuf,

    pub attack_duration: Duration,
    pub attack_level: f64,
    pub decay_duration: Duration,
    pub sustain_level: f64,
    /// Time into the sound at which it releases on its own. Zero holds the
    /// sustain until stopped.
    pub release_start: Duration,
    pub release_duration: Duration,
    /// Hold the release-start volume until the clip drains.
    pub release_duration_infinite: bool,

    /// Loop end. Zero disables looping.
    pub loop_from: Duration,
    /// Loop start.
    pub loop_to: Duration,
    /// Loop-backs before playing through. Zero loops forever.
    pub loop_limit: u32,
    /// Only buffer this much of the file. Zero buffers all of it.
    pub max_duration: Duration,
    pub start_time: Duration,
    /// Play as soon as the voice is built, without a cue.
    pub autostart: bool,

    /// Note volume folded into the envelope.
    pub designer_volume: f64,
    /// Pan used when a cue does not give one.
    pub designer_pan: f64,

    pub triggers: Triggers,
}

impl Default for SoundDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            wav_file: PathBuf::new(),
            attack_duration: Duration::ZERO,
            attack_level: 1.0,
            decay_duration: Duration::ZERO,
            sustain_level: 1.0,
            release_start: Duration::ZERO,
            release_duration: Duration::ZERO,
            release_duration_infinite: false,
            loop_from: Duration::ZERO,
            loop_to: Duration::ZERO,
            loop_limit: 0,
            max_duration: Duration::ZERO,
            start_time: Duration::ZERO,
            autostart: false,
            designer_volume: 1.0,
            designer_pan: 0.0,
            triggers: Triggers::default(),
        }
    }
}

impl SoundDefinition {
    pub fn new(name: impl Into<String>, wav_file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            wav_file: wav_file.into(),
            ..Default::default()
        }
    }

    pub fn envelope_params(&self) -> EnvelopeParams {
        EnvelopeParams {
            attack_duration: nanos(self.attack_duration),
            attack_level: self.attack_level,
            decay_duration: nanos(self.decay_duration),
            sustain_level: self.sustain_level,
            release_start: nanos(self.release_start),
            release_duration: if self.release_duration_infinite {
                ReleaseDuration::Infinite
            } else {
                ReleaseDuration::Finite(nanos(self.release_duration))
            },
            volume: self.designer_volume,
            autostart: self.autostart,
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            loop_to: nanos(self.loop_to),
            loop_from: nanos(self.loop_from),
            loop_limit: self.loop_limit,
            max_duration: nanos(self.max_duration),
            start_time: nanos(self.start_time),
            autostart: self.autostart,
        }
    }

    /// Check the authored values before any file is opened.
    pub fn validate(&self) -> Result<()> {
        self.envelope_params().validate()?;
        self.loop_settings().validate()?;
        if !(-1.0..=1.0).contains(&self.designer_pan) {
            return Err(showcue_dsp::Error::InvalidParameter(format!(
                "designer_pan = {}",
                self.designer_pan
            ))
            .into());
        }
        Ok(())
    }
}

/// External events bound to a sound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Triggers {
    /// Only match notes on this program. `None` matches any.
    pub midi_program: Option<u8>,
    pub midi_note: Option<u8>,
    pub osc_name: Option<String>,
    pub function_key: Option<String>,
}

impl Triggers {
    pub fn matches(&self, trigger: &Trigger) -> bool {
        match trigger {
            Trigger::MidiNote { program, note } => {
                self.midi_note == Some(*note)
                    && self.midi_program.map_or(true, |p| Some(p) == *program)
            }
            Trigger::Osc(name) => self.osc_name.as_deref() == Some(name.as_str()),
            Trigger::FunctionKey(key) => self.function_key.as_deref() == Some(key.as_str()),
        }
    }
}

/// An external event that may start a sound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Note-on, with the channel's current program if one was selected.
    MidiNote { program: Option<u8>, note: u8 },
    Osc(String),
    FunctionKey(String),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::MidiNote {
                program: Some(program),
                note,
            } => write!(f, "MIDI note {note} (program {program})"),
            Trigger::MidiNote { program: None, note } => write!(f, "MIDI note {note}"),
            Trigger::Osc(name) => write!(f, "OSC {name}"),
            Trigger::FunctionKey(key) => write!(f, "key {key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_params_from_definition() {
        let def = SoundDefinition {
            attack_duration: Duration::from_millis(50),
            release_start: Duration::from_secs(2),
            release_duration: Duration::from_millis(250),
            designer_volume: 0.8,
            ..SoundDefinition::new("bell", "bell.wav")
        };
        let params = def.envelope_params();
        assert_eq!(params.attack_duration, 50_000_000);
        assert_eq!(params.release_start, 2_000_000_000);
        assert_eq!(params.release_duration, ReleaseDuration::Finite(250_000_000));
        assert_eq!(params.volume, 0.8);
    }

    #[test]
    fn test_infinite_release_flag_wins() {
        let def = SoundDefinition {
            release_duration: Duration::from_secs(1),
            release_duration_infinite: true,
            ..Default::default()
        };
        assert_eq!(def.envelope_params().release_duration, ReleaseDuration::Infinite);
    }

    #[test]
    fn test_inverted_loop_rejected() {
        let def = SoundDefinition {
            loop_to: Duration::from_secs(2),
            loop_from: Duration::from_secs(1),
            ..SoundDefinition::new("rain", "rain.wav")
        };
        assert!(def.validate().is_err());
        assert!(SoundDefinition::new("rain", "rain.wav").validate().is_ok());
    }

    #[test]
    fn test_pan_out_of_range_rejected() {
        let def = SoundDefinition {
            designer_pan: 1.5,
            ..Default::default()
        };
        assert!(def.validate().is_err());
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    #[test]
    fn test_midi_trigger_respects_program() {
        let triggers = Triggers {
            midi_program: Some(3),
            midi_note: Some(60),
            ..Default::default()
        };
        assert!(triggers.matches(&Trigger::MidiNote {
            program: Some(3),
            note: 60
        }));
        assert!(!triggers.matches(&Trigger::MidiNote {
            program: Some(4),
            note: 60
        }));
        assert!(!triggers.matches(&Trigger::MidiNote {
            program: None,
            note: 60
        }));

        let any_program = Triggers {
            midi_note: Some(60),
            ..Default::default()
        };
        assert!(any_program.matches(&Trigger::MidiNote {
            program: None,
            note: 60
        }));
    }

    #[test]
    fn test_osc_and_key_triggers() {
        let triggers = Triggers {
            osc_name: Some("/thunder".into()),
            function_key: Some("F5".into()),
            ..Default::default()
        };
        assert!(triggers.matches(&Trigger::Osc("/thunder".into())));
        assert!(triggers.matches(&Trigger::FunctionKey("F5".into())));
        assert!(!triggers.matches(&Trigger::FunctionKey("F6".into())));
        assert_eq!(Trigger::FunctionKey("F5".into()).to_string(), "key F5");
    }
}
