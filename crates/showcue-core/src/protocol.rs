//! Voice control protocol.
//!
//! Control flows into a voice chain as [`VoiceControl`] messages; the chain
//! answers on the event channel with [`VoiceNotification`]s. Every start cycle
//! carries a [`RunId`] so a notification left over from an earlier cycle of a
//! reused voice can be told apart from the current one.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one start cycle of a voice.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RunId(pub u64);

impl RunId {
    pub fn next(self) -> Self {
        RunId(self.0.wrapping_add(1))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// Control messages observed by both the loop buffer and the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceControl {
    /// Rewind to the start offset, clear completion state, reset elapsed time.
    Start { run: RunId },
    /// Suspend output without moving the drain position or envelope phase.
    Pause,
    /// Resume after `Pause`.
    Continue,
    /// Stop honouring loop-back and begin the envelope release now.
    Release,
    /// Emit an end marker and terminate the chain.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// The sound reached its natural end.
    Completed,
    /// The sound entered its release phase ("terminated").
    ReleaseStarted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceNotification {
    pub sound: String,
    pub run: RunId,
    pub kind: NotificationKind,
}

/// Sending half of the event channel. Cloned into every voice.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<VoiceNotification>,
}

impl EventSender {
    /// Never blocks. A dropped receiver is logged and otherwise ignored.
    pub fn send(&self, notification: VoiceNotification) {
        if let Err(err) = self.tx.send(notification) {
            tracing::warn!(
                "Event channel closed, dropping {:?} for {}",
                err.0.kind,
                err.0.sound
            );
        }
    }
}

pub type EventReceiver = Receiver<VoiceNotification>;

/// Create the voice-to-sequencer event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = unbounded();
    (EventSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_channel_delivers_in_order() {
        let (tx, rx) = event_channel();
        for kind in [NotificationKind::ReleaseStarted, NotificationKind::Completed] {
            tx.send(VoiceNotification {
                sound: "bell".into(),
                run: RunId(3),
                kind,
            });
        }
        assert_eq!(rx.recv().map(|n| n.kind).ok(), Some(NotificationKind::ReleaseStarted));
        assert_eq!(rx.recv().map(|n| n.kind).ok(), Some(NotificationKind::Completed));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_harmless() {
        let (tx, rx) = event_channel();
        drop(rx);
        tx.send(VoiceNotification {
            sound: "bell".into(),
            run: RunId::default(),
            kind: NotificationKind::Completed,
        });
    }

    #[test]
    fn test_run_id_next() {
        assert_eq!(RunId(7).next(), RunId(8));
        assert_eq!(RunId(u64::MAX).next(), RunId(0));
    }
}
