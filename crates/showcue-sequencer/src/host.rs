//! Seams to the rest of the show: the voices and the operator's screen.

use crate::remember::RecordId;
use crate::{Result, StartParams};
use showcue_core::RunId;

/// Starts and releases sounds on the sequencer's behalf.
pub trait SoundPlayer {
    /// Start `sound`, returning the run its notifications will carry.
    fn start(&mut self, sound: &str, params: &StartParams) -> Result<RunId>;

    /// Ask a running sound to release. Stale runs are ignored.
    fn release(&mut self, sound: &str, run: RunId);
}

/// The operator-facing text surfaces.
pub trait OperatorDisplay {
    /// Show or refresh the status message for a running sound.
    fn show_message(&mut self, id: RecordId, text: &str);
    fn remove_message(&mut self, id: RecordId);
    /// The prompt line. An empty string clears it.
    fn set_operator_text(&mut self, text: &str);
    fn set_cluster_text(&mut self, cluster: usize, text: &str);
    /// Return a cluster to its idle appearance.
    fn clear_cluster(&mut self, cluster: usize);
    /// Volume and pan slider captions, e.g. `Vol 100%` and `Center`.
    fn set_cluster_levels(&mut self, _cluster: usize, _volume: &str, _pan: &str) {}
}

/// Borrowed collaborators for one sequencer call.
pub struct ShowContext<'a> {
    pub player: &'a mut dyn SoundPlayer,
    pub display: &'a mut dyn OperatorDisplay,
}

impl<'a> ShowContext<'a> {
    pub fn new(player: &'a mut dyn SoundPlayer, display: &'a mut dyn OperatorDisplay) -> Self {
        Self { player, display }
    }
}
