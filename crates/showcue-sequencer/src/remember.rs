//! What the sequencer remembers between events.
//!
//! Each item that waits on something outside the sequencer (a sound
//! finishing, a cluster button, a timer, the operator) leaves a record here
//! until that event arrives.

use showcue_core::RunId;
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

/// Identifies one record. Also the message id on the operator display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record#{}", self.0)
    }
}

/// A sound started by a Start Sound item.
#[derive(Debug, Clone)]
pub struct RunningRecord {
    pub id: RecordId,
    /// Name of the Start Sound item.
    pub item: String,
    pub tag: String,
    pub sound: String,
    pub run: RunId,
    pub cluster: usize,
    pub importance: u32,
    pub text: String,
    pub started_at: Instant,
    pub next_completion: Option<String>,
    pub next_termination: Option<String>,
    /// The sequencer asked this sound to release.
    pub release_sent: bool,
    /// The sound reported entering its release stage.
    pub release_seen: bool,
    /// Displaced from its cluster by a newer sound.
    pub off_cluster: bool,
    pub termination_fired: bool,
}

impl RunningRecord {
    pub fn is_releasing(&self) -> bool {
        self.release_sent || self.release_seen
    }
}

/// A pending Offer Sound.
#[derive(Debug, Clone)]
pub struct OfferRecord {
    pub id: RecordId,
    pub item: String,
    pub tag: String,
    pub cluster: usize,
    pub text: String,
    pub next_to_start: Option<String>,
}

/// A Wait whose timer has not fired.
#[derive(Debug, Clone)]
pub struct WaitRecord {
    pub id: RecordId,
    pub item: String,
    pub text: Option<String>,
    pub next_completion: Option<String>,
}

/// An Operator Wait, current or queued.
#[derive(Debug, Clone)]
pub struct OperatorRecord {
    pub id: RecordId,
    pub item: String,
    pub text: String,
    pub next_play: Option<String>,
}

/// The working sets.
#[derive(Debug, Default)]
pub struct RememberSets {
    pub running: Vec<RunningRecord>,
    pub offering: Vec<OfferRecord>,
    pub waiting: Vec<WaitRecord>,
    /// The Operator Wait whose prompt is showing.
    pub operator_current: Option<OperatorRecord>,
    /// Operator Waits queued behind the current one, oldest first.
    pub operator_queue: VecDeque<OperatorRecord>,
    next_id: u64,
}

impl RememberSets {
    pub fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId(self.next_id)
    }

    pub fn running(&self, id: RecordId) -> Option<&RunningRecord> {
        self.running.iter().find(|r| r.id == id)
    }

    pub fn running_mut(&mut self, id: RecordId) -> Option<&mut RunningRecord> {
        self.running.iter_mut().find(|r| r.id == id)
    }

    pub fn offer(&self, id: RecordId) -> Option<&OfferRecord> {
        self.offering.iter().find(|o| o.id == id)
    }

    /// Position of the running record a notification belongs to.
    pub fn find_run(&self, sound: &str, run: RunId) -> Option<usize> {
        self.running
            .iter()
            .position(|r| r.sound == sound && r.run == run)
    }

    pub fn take_wait(&mut self, id: RecordId) -> Option<WaitRecord> {
        let index = self.waiting.iter().position(|w| w.id == id)?;
        Some(self.waiting.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, sound: &str, run: u64) -> RunningRecord {
        RunningRecord {
            id: RecordId(id),
            item: "A".into(),
            tag: sound.into(),
            sound: sound.into(),
            run: RunId(run),
            cluster: 0,
            importance: 0,
            text: sound.into(),
            started_at: Instant::now(),
            next_completion: None,
            next_termination: None,
            release_sent: false,
            release_seen: false,
            off_cluster: false,
            termination_fired: false,
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let mut sets = RememberSets::default();
        let a = sets.allocate_id();
        let b = sets.allocate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_find_run_matches_sound_and_run() {
        let mut sets = RememberSets::default();
        sets.running.push(record(1, "bell", 1));
        sets.running.push(record(2, "bell", 2));
        assert_eq!(sets.find_run("bell", RunId(2)), Some(1));
        assert_eq!(sets.find_run("bell", RunId(3)), None);
        assert_eq!(sets.find_run("horn", RunId(1)), None);
    }

    #[test]
    fn test_releasing_either_way() {
        let mut r = record(1, "bell", 1);
        assert!(!r.is_releasing());
        r.release_seen = true;
        assert!(r.is_releasing());
        r.release_seen = false;
        r.release_sent = true;
        assert!(r.is_releasing());
    }
}
