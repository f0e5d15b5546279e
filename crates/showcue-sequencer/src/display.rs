//! Operator display arbitration.
//!
//! At most one running sound owns the status message at a time: the most
//! important one, with ties going to the sound already shown so the message
//! does not flicker between equals.

use crate::host::OperatorDisplay;
use crate::remember::RecordId;
use showcue_core::time::format_elapsed;
use std::time::Instant;

/// A running sound that may own the status message.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub id: RecordId,
    pub importance: u32,
    pub text: &'a str,
    pub started_at: Instant,
}

#[derive(Debug, Default)]
pub struct DisplayArbiter {
    shown: Option<RecordId>,
}

impl DisplayArbiter {
    pub fn shown(&self) -> Option<RecordId> {
        self.shown
    }

    /// The candidate that should be on screen. Importance 0 never shows.
    pub fn choose<'c, 'a>(&self, candidates: &'c [Candidate<'a>]) -> Option<&'c Candidate<'a>> {
        let best = candidates
            .iter()
            .map(|c| c.importance)
            .filter(|&importance| importance > 0)
            .max()?;
        candidates
            .iter()
            .filter(|c| c.importance == best)
            .find(|c| Some(c.id) == self.shown)
            .or_else(|| candidates.iter().find(|c| c.importance == best))
    }

    /// Show the winner with its elapsed time, or clear the message.
    pub fn render(
        &mut self,
        candidates: &[Candidate<'_>],
        now: Instant,
        display: &mut dyn OperatorDisplay,
    ) {
        match self.choose(candidates) {
            Some(winner) => {
                if let Some(old) = self.shown.filter(|&old| old != winner.id) {
                    display.remove_message(old);
                }
                let elapsed = now.saturating_duration_since(winner.started_at);
                display.show_message(
                    winner.id,
                    &format!("{} {}", winner.text, format_elapsed(elapsed)),
                );
                self.shown = Some(winner.id);
            }
            None => {
                if let Some(old) = self.shown.take() {
                    display.remove_message(old);
                }
            }
        }
    }

    /// Take `id` off the screen now if it is showing.
    pub fn forget(&mut self, id: RecordId, display: &mut dyn OperatorDisplay) {
        if self.shown == Some(id) {
            display.remove_message(id);
            self.shown = None;
        }
    }
}
