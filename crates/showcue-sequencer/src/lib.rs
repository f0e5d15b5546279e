//! Cue script interpreter.
//!
//! A script is a set of named [`SequenceItem`]s linked through their `next`
//! fields. The [`Sequencer`] walks those links, starting sounds through a
//! [`SoundPlayer`] and driving the operator's screen through an
//! [`OperatorDisplay`]. It is driven entirely by its host: operator buttons,
//! remote commands, voice notifications and a periodic tick.
//!
//! ```ignore
//! use showcue_sequencer::{Script, SequenceItem, Sequencer, ShowContext, StartSound};
//!
//! let script = Script::new(vec![
//!     SequenceItem::StartSequence { name: "begin".into(), next: Some("A".into()) },
//!     StartSound::new("A", "bell").cluster(0).next_completion("Z").into(),
//! ])?;
//! let mut sequencer = Sequencer::new(script, 16);
//! sequencer.start(Instant::now(), &mut ShowContext::new(&mut player, &mut display))?;
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod cluster;
pub mod display;
pub mod host;
pub mod items;
pub mod remember;
pub mod script;
pub mod sequencer;
pub mod timer;

pub use cluster::{ClusterSlot, ClusterTable};
pub use display::{Candidate, DisplayArbiter};
pub use host::{OperatorDisplay, ShowContext, SoundPlayer};
pub use items::{SequenceItem, StartParams, StartSound};
pub use remember::{RecordId, RememberSets, RunningRecord};
pub use script::Script;
pub use sequencer::Sequencer;
pub use timer::TimerQueue;
