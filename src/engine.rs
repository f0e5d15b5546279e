//! ShowEngine: the application context tying voices, sequencer and display together.

use crate::voice::{Voice, VoiceBank};
use crate::{Error, Result, ShowEngineBuilder, Trigger};
use crossbeam_channel::RecvTimeoutError;
use showcue_core::{
    EngineConfig, EventReceiver, MixBus, StereoBlock, StereoLevels, VoiceNotification,
};
use showcue_dsp::{pan_label, volume_label};
use showcue_sampler::LoopBufferStatus;
use showcue_sequencer::{OperatorDisplay, RecordId, Sequencer, ShowContext, StartSound};
use std::thread;
use std::time::{Duration, Instant};

/// A command from a remote control surface, already decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Press a cluster's Start button.
    Start(usize),
    /// Press a cluster's Stop button.
    Stop(usize),
    /// Advance the current Operator Wait. The cue number is informational.
    Cue(u32),
    Quit,
}

/// The running show.
///
/// Owns every voice, the sequencer and the operator display. All sequencer
/// work happens on the thread that calls into the engine; voices run on their
/// own workers and report back through the event channel, which
/// [`process_events`](Self::process_events) drains.
///
/// # Example
///
/// ```ignore
/// let mut engine = ShowEngine::builder()
///     .sounds(sounds)
///     .script(items)
///     .display(MyScreen::new())
///     .build()?;
///
/// engine.start_show()?;
/// engine.run_for(Duration::from_secs(60))?;
/// engine.shutdown();
/// ```
pub struct ShowEngine {
    config: EngineConfig,
    sequencer: Sequencer,
    voices: VoiceBank,
    events: EventReceiver,
    display: Box<dyn OperatorDisplay>,
    quit: bool,
}

impl ShowEngine {
    pub fn builder() -> ShowEngineBuilder {
        ShowEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        config: EngineConfig,
        sequencer: Sequencer,
        voices: VoiceBank,
        events: EventReceiver,
        display: Box<dyn OperatorDisplay>,
    ) -> Self {
        Self {
            config,
            sequencer,
            voices,
            events,
            display,
            quit: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Run the script from its Start Sequence item.
    pub fn start_show(&mut self) -> Result<()> {
        let now = Instant::now();
        let mut ctx = ShowContext::new(&mut self.voices, self.display.as_mut());
        self.sequencer.start(now, &mut ctx)?;
        Ok(())
    }

    /// Remote "Cue": runs the Start Sound numbered `cue`, otherwise presses Play.
    pub fn go(&mut self, cue: u32) -> Result<()> {
        let now = Instant::now();
        let mut ctx = ShowContext::new(&mut self.voices, self.display.as_mut());
        self.sequencer.go(cue, now, &mut ctx)?;
        Ok(())
    }

    pub fn cluster_start(&mut self, cluster: usize) -> Result<()> {
        let now = Instant::now();
        let mut ctx = ShowContext::new(&mut self.voices, self.display.as_mut());
        self.sequencer.cluster_start(cluster, now, &mut ctx)?;
        Ok(())
    }

    pub fn cluster_stop(&mut self, cluster: usize) -> Result<()> {
        let mut ctx = ShowContext::new(&mut self.voices, self.display.as_mut());
        self.sequencer.cluster_stop(cluster, &mut ctx)?;
        Ok(())
    }

    pub fn operator_play(&mut self) -> Result<()> {
        let now = Instant::now();
        let mut ctx = ShowContext::new(&mut self.voices, self.display.as_mut());
        self.sequencer.operator_play(now, &mut ctx)?;
        Ok(())
    }

    pub fn handle_remote(&mut self, command: RemoteCommand) -> Result<()> {
        tracing::debug!("Remote {:?}", command);
        match command {
            RemoteCommand::Start(cluster) => self.cluster_start(cluster),
            RemoteCommand::Stop(cluster) => self.cluster_stop(cluster),
            RemoteCommand::Cue(cue) => self.go(cue),
            RemoteCommand::Quit => {
                tracing::info!("Quit requested");
                self.quit = true;
                Ok(())
            }
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Start the sound bound to `trigger` on the first free cluster.
    pub fn trigger(&mut self, trigger: &Trigger) -> Result<()> {
        let sound = self
            .voices
            .iter()
            .find(|voice| voice.definition().triggers.matches(trigger))
            .map(|voice| voice.name().to_string())
            .ok_or_else(|| Error::UnboundTrigger(trigger.to_string()))?;
        tracing::info!("{trigger} starts {sound}");
        let now = Instant::now();
        let start = StartSound::new(format!("{trigger}"), sound);
        let mut ctx = ShowContext::new(&mut self.voices, self.display.as_mut());
        self.sequencer.play_sound(start, now, &mut ctx)?;
        Ok(())
    }

    /// Deliver queued voice notifications to the sequencer, then tick it.
    ///
    /// Returns the notifications handled. A chain that fails while following
    /// a notification is logged and does not stop the rest from being
    /// delivered; a failure while firing expired Waits is returned.
    pub fn process_events(&mut self, now: Instant) -> Result<Vec<VoiceNotification>> {
        let pending: Vec<_> = self.events.try_iter().collect();
        for notification in &pending {
            self.dispatch(notification, now);
        }
        let mut ctx = ShowContext::new(&mut self.voices, self.display.as_mut());
        self.sequencer.tick(now, &mut ctx)?;
        Ok(pending)
    }

    fn dispatch(&mut self, notification: &VoiceNotification, now: Instant) {
        tracing::debug!(
            "{} ({}) reports {:?}",
            notification.sound,
            notification.run,
            notification.kind
        );
        let mut ctx = ShowContext::new(&mut self.voices, self.display.as_mut());
        if let Err(err) = self.sequencer.handle_notification(notification, now, &mut ctx) {
            tracing::warn!("Following {} failed: {err}", notification.sound);
        }
    }

    /// Drive the show from the calling thread for `duration`, or until a
    /// `Quit` arrives. Notifications are handled as they arrive; the display
    /// and Wait timers are refreshed every `display_refresh`.
    pub fn run_for(&mut self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        let mut next_refresh = Instant::now();
        while !self.quit {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if now >= next_refresh {
                self.process_events(now)?;
                next_refresh = now + self.config.display_refresh;
            }
            let wake = next_refresh.min(deadline);
            match self
                .events
                .recv_timeout(wake.saturating_duration_since(Instant::now()))
            {
                Ok(notification) => self.dispatch(&notification, Instant::now()),
                Err(RecvTimeoutError::Timeout) => {}
                // No voice loaded: nothing will ever arrive, just keep time.
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(wake.saturating_duration_since(Instant::now()))
                }
            }
        }
        Ok(())
    }

    /// Volume slider on a cluster: adjusts whatever is playing there.
    pub fn set_cluster_volume(&mut self, cluster: usize, volume: f64) -> Result<()> {
        let voice = self.cluster_voice(cluster)?;
        let Some(voice) = voice else {
            tracing::debug!("Cluster {cluster} idle, volume ignored");
            return Ok(());
        };
        voice.controls().set_volume(volume);
        let (volume, pan) = (voice.controls().volume(), voice.controls().pan());
        self.display
            .set_cluster_levels(cluster, &volume_label(volume), &pan_label(pan));
        Ok(())
    }

    /// Pan slider on a cluster.
    pub fn set_cluster_pan(&mut self, cluster: usize, pan: f64) -> Result<()> {
        let voice = self.cluster_voice(cluster)?;
        let Some(voice) = voice else {
            tracing::debug!("Cluster {cluster} idle, pan ignored");
            return Ok(());
        };
        voice.controls().set_pan(pan);
        let (volume, pan) = (voice.controls().volume(), voice.controls().pan());
        self.display
            .set_cluster_levels(cluster, &volume_label(volume), &pan_label(pan));
        Ok(())
    }

    fn cluster_voice(&mut self, cluster: usize) -> Result<Option<&mut Voice>> {
        if cluster >= self.sequencer.cluster_count() {
            return Err(showcue_sequencer::Error::InvalidCluster(cluster).into());
        }
        Ok(self
            .sequencer
            .cluster_sound(cluster)
            .and_then(|sound| self.voices.get_mut(sound)))
    }

    pub fn pause_sound(&mut self, sound: &str) -> Result<()> {
        self.voices.voice(sound)?.pause();
        Ok(())
    }

    pub fn resume_sound(&mut self, sound: &str) -> Result<()> {
        self.voices.voice(sound)?.resume();
        Ok(())
    }

    /// Sounds that failed to load, with the reason.
    pub fn disabled_sounds(&self) -> &[(String, String)] {
        self.voices.disabled()
    }

    pub fn levels(&self, sound: &str) -> Option<StereoLevels> {
        self.voices.get(sound).map(Voice::levels)
    }

    pub fn voice_snapshot(&self, sound: &str) -> Option<LoopBufferStatus> {
        self.voices.get(sound).map(Voice::snapshot)
    }

    pub fn voice(&self, sound: &str) -> Option<&Voice> {
        self.voices.get(sound)
    }

    /// Send `Shutdown` to every voice and join their workers.
    pub fn shutdown(&mut self) {
        tracing::info!("Shutting down {} voices", self.voices.len());
        self.voices.shutdown();
    }
}

impl Drop for ShowEngine {
    fn drop(&mut self) {
        self.voices.shutdown();
    }
}

/// Discards all audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBus;

impl MixBus for NullBus {
    fn mix(&self, _voice: &str, _block: &StereoBlock) {}
}

/// Logs every display call through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDisplay;

impl OperatorDisplay for LogDisplay {
    fn show_message(&mut self, id: RecordId, text: &str) {
        tracing::trace!("message {id}: {text}");
    }

    fn remove_message(&mut self, id: RecordId) {
        tracing::debug!("message {id} removed");
    }

    fn set_operator_text(&mut self, text: &str) {
        tracing::info!("operator: {text}");
    }

    fn set_cluster_text(&mut self, cluster: usize, text: &str) {
        tracing::info!("cluster {cluster}: {text}");
    }

    fn clear_cluster(&mut self, cluster: usize) {
        tracing::debug!("cluster {cluster} cleared");
    }

    fn set_cluster_levels(&mut self, cluster: usize, volume: &str, pan: &str) {
        tracing::debug!("cluster {cluster}: {volume} {pan}");
    }
}
