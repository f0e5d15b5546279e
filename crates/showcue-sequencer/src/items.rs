//! Sequence items: the statements of a cue script.
//!
//! Items are linked by name through their `next` fields; order in the script
//! carries no meaning.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Start a sound on a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartSound {
    pub name: String,
    /// Stop items address running sounds by tag. Defaults to the sound name.
    pub tag: Option<String>,
    pub sound: String,
    /// `None` picks the first cluster with nothing playing.
    pub cluster: Option<usize>,
    /// Multiplies the sound's designer volume.
    pub volume: f64,
    /// Replaces the sound's designer pan when set.
    pub pan: Option<f64>,
    /// Display priority. 0 never shows on the operator display.
    pub importance: u32,
    /// Operator display and cluster text. Defaults to the sound name.
    pub text: Option<String>,
    /// Show-control cue number: a remote Go with this number runs the item.
    pub q_number: Option<String>,
    pub next_starts: Option<String>,
    pub next_completion: Option<String>,
    pub next_termination: Option<String>,
}

impl Default for StartSound {
    fn default() -> Self {
        Self {
            name: String::new(),
            tag: None,
            sound: String::new(),
            cluster: None,
            volume: 1.0,
            pan: None,
            importance: 0,
            text: None,
            q_number: None,
            next_starts: None,
            next_completion: None,
            next_termination: None,
        }
    }
}

impl StartSound {
    pub fn new(name: impl Into<String>, sound: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sound: sound.into(),
            ..Default::default()
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn cluster(mut self, cluster: usize) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn pan(mut self, pan: f64) -> Self {
        self.pan = Some(pan);
        self
    }

    pub fn importance(mut self, importance: u32) -> Self {
        self.importance = importance;
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn q_number(mut self, cue: impl Into<String>) -> Self {
        self.q_number = Some(cue.into());
        self
    }

    pub fn next_starts(mut self, next: impl Into<String>) -> Self {
        self.next_starts = Some(next.into());
        self
    }

    pub fn next_completion(mut self, next: impl Into<String>) -> Self {
        self.next_completion = Some(next.into());
        self
    }

    pub fn next_termination(mut self, next: impl Into<String>) -> Self {
        self.next_termination = Some(next.into());
        self
    }

    pub fn effective_tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.sound)
    }

    pub fn effective_text(&self) -> &str {
        self.text.as_deref().unwrap_or(&self.sound)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequenceItem {
    /// Entry point of the script.
    StartSequence {
        name: String,
        next: Option<String>,
    },
    StartSound(StartSound),
    /// Release every running sound with this tag.
    Stop {
        name: String,
        tag: String,
        next: Option<String>,
    },
    /// Continue with `next` now and with `next_completion` once the time is up.
    Wait {
        name: String,
        time_to_wait: Duration,
        text: Option<String>,
        next: Option<String>,
        next_completion: Option<String>,
    },
    /// Let the operator start `next_to_start` from a cluster's Start button.
    OfferSound {
        name: String,
        tag: String,
        cluster: usize,
        text: String,
        next: Option<String>,
        next_to_start: Option<String>,
    },
    CeaseOfferingSound {
        name: String,
        tag: String,
        next: Option<String>,
    },
    /// Prompt the operator and continue with `next_play` when they press Play.
    OperatorWait {
        name: String,
        text: String,
        next: Option<String>,
        next_play: Option<String>,
    },
}

impl SequenceItem {
    pub fn name(&self) -> &str {
        match self {
            SequenceItem::StartSequence { name, .. }
            | SequenceItem::Stop { name, .. }
            | SequenceItem::Wait { name, .. }
            | SequenceItem::OfferSound { name, .. }
            | SequenceItem::CeaseOfferingSound { name, .. }
            | SequenceItem::OperatorWait { name, .. } => name,
            SequenceItem::StartSound(start) => &start.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SequenceItem::StartSequence { .. } => "Start Sequence",
            SequenceItem::StartSound(_) => "Start Sound",
            SequenceItem::Stop { .. } => "Stop",
            SequenceItem::Wait { .. } => "Wait",
            SequenceItem::OfferSound { .. } => "Offer Sound",
            SequenceItem::CeaseOfferingSound { .. } => "Cease Offering Sound",
            SequenceItem::OperatorWait { .. } => "Operator Wait",
        }
    }

    /// Every item name this item can continue with.
    pub fn links(&self) -> Vec<&str> {
        let links: Vec<&Option<String>> = match self {
            SequenceItem::StartSequence { next, .. }
            | SequenceItem::Stop { next, .. }
            | SequenceItem::CeaseOfferingSound { next, .. } => vec![next],
            SequenceItem::StartSound(start) => vec![
                &start.next_starts,
                &start.next_completion,
                &start.next_termination,
            ],
            SequenceItem::Wait {
                next,
                next_completion,
                ..
            } => vec![next, next_completion],
            SequenceItem::OfferSound {
                next,
                next_to_start,
                ..
            } => vec![next, next_to_start],
            SequenceItem::OperatorWait {
                next, next_play, ..
            } => vec![next, next_play],
        };
        links.into_iter().filter_map(|l| l.as_deref()).collect()
    }
}

impl From<StartSound> for SequenceItem {
    fn from(start: StartSound) -> Self {
        SequenceItem::StartSound(start)
    }
}

/// What the sequencer asks the player for when it starts a sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartParams {
    pub cluster: usize,
    pub volume: f64,
    pub pan: Option<f64>,
}
