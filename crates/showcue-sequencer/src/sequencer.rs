//! The cue script interpreter.
//!
//! Execution follows `next` names from item to item until a name is absent,
//! unknown, or belongs to an item that waits on something outside the
//! sequencer. Those items leave a record in the [`RememberSets`] and the chain
//! resumes from the record when the event arrives: a voice notification, a
//! cluster button, the Play button or the periodic tick.
//!
//! The sequencer is single-threaded. Every entry point runs to completion
//! before returning and borrows its collaborators through a [`ShowContext`].

use crate::cluster::ClusterTable;
use crate::display::{Candidate, DisplayArbiter};
use crate::host::ShowContext;
use crate::items::{SequenceItem, StartParams, StartSound};
use crate::remember::{
    OfferRecord, OperatorRecord, RecordId, RememberSets, RunningRecord, WaitRecord,
};
use crate::script::Script;
use crate::timer::TimerQueue;
use crate::{Error, Result};
use showcue_core::{NotificationKind, VoiceNotification};
use std::collections::HashSet;
use std::time::{Duration, Instant};

pub struct Sequencer {
    script: Script,
    clusters: ClusterTable,
    records: RememberSets,
    timers: TimerQueue<RecordId>,
    arbiter: DisplayArbiter,
    /// The Wait or Operator Wait whose text is on the prompt line.
    prompt_owner: Option<RecordId>,
}

impl Sequencer {
    pub fn new(script: Script, cluster_count: usize) -> Self {
        Self {
            script,
            clusters: ClusterTable::new(cluster_count),
            records: RememberSets::default(),
            timers: TimerQueue::default(),
            arbiter: DisplayArbiter::default(),
            prompt_owner: None,
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Run from the script's Start Sequence item.
    pub fn start(&mut self, now: Instant, ctx: &mut ShowContext<'_>) -> Result<()> {
        let name = self
            .script
            .start_name()
            .ok_or(Error::NoStartSequence)?
            .to_string();
        tracing::info!("Starting sequence at {name}");
        self.execute(&name, now, ctx)
    }

    /// Run `name` and everything it chains to synchronously.
    ///
    /// An unknown name is reported on the prompt line and ends the chain.
    pub fn execute(&mut self, name: &str, now: Instant, ctx: &mut ShowContext<'_>) -> Result<()> {
        let mut visited = HashSet::new();
        let mut next = Some(name.to_string());
        while let Some(name) = next.take() {
            let Some(item) = self.script.get(&name).cloned() else {
                let err = Error::UnknownItem(name);
                tracing::warn!("{err}");
                ctx.display.set_operator_text(&err.to_string());
                return Err(err);
            };
            if !visited.insert(name.clone()) {
                tracing::warn!("Sequence item {name} reached twice in one step, stopping");
                return Err(Error::Cycle(name));
            }
            tracing::debug!("Executing {} {}", item.kind(), name);
            next = self.step(item, now, ctx)?;
        }
        Ok(())
    }

    fn step(
        &mut self,
        item: SequenceItem,
        now: Instant,
        ctx: &mut ShowContext<'_>,
    ) -> Result<Option<String>> {
        match item {
            SequenceItem::StartSequence { next, .. } => Ok(next),
            SequenceItem::StartSound(start) => self.start_sound(start, now, ctx),
            SequenceItem::Stop { tag, next, .. } => {
                self.release_tag(&tag, ctx);
                Ok(next)
            }
            SequenceItem::Wait {
                name,
                time_to_wait,
                text,
                next,
                next_completion,
            } => {
                self.begin_wait(name, time_to_wait, text, next_completion, now, ctx);
                Ok(next)
            }
            SequenceItem::OfferSound {
                name,
                tag,
                cluster,
                text,
                next,
                next_to_start,
            } => {
                let id = self.records.allocate_id();
                self.offer(
                    OfferRecord {
                        id,
                        item: name,
                        tag,
                        cluster,
                        text,
                        next_to_start,
                    },
                    ctx,
                )?;
                Ok(next)
            }
            SequenceItem::CeaseOfferingSound { tag, next, .. } => {
                self.cease_offering(&tag, ctx);
                Ok(next)
            }
            SequenceItem::OperatorWait {
                name,
                text,
                next,
                next_play,
            } => {
                let record = OperatorRecord {
                    id: self.records.allocate_id(),
                    item: name,
                    text,
                    next_play,
                };
                if self.records.operator_current.is_none() {
                    self.show_prompt(&record, ctx);
                    self.records.operator_current = Some(record);
                } else {
                    tracing::debug!("Operator Wait {} queued", record.item);
                    self.records.operator_queue.push_back(record);
                }
                Ok(next)
            }
        }
    }

    fn start_sound(
        &mut self,
        start: StartSound,
        now: Instant,
        ctx: &mut ShowContext<'_>,
    ) -> Result<Option<String>> {
        let cluster = match start.cluster {
            Some(cluster) => cluster,
            None => self.clusters.first_free().ok_or_else(|| {
                tracing::warn!("No free cluster for {}", start.sound);
                Error::NoFreeCluster
            })?,
        };

        let occupant = self.clusters.get(cluster)?.running;
        if let Some(occupant) = occupant {
            match self.records.running_mut(occupant) {
                Some(record) if record.is_releasing() => {
                    tracing::debug!(
                        "{} displaces releasing {} from cluster {cluster}",
                        start.sound,
                        record.sound
                    );
                    record.off_cluster = true;
                    ctx.display.clear_cluster(cluster);
                }
                Some(record) => {
                    tracing::warn!(
                        "Cannot start {} on cluster {cluster}: {} is still playing",
                        start.sound,
                        record.sound
                    );
                    return Err(Error::ClusterBusy(cluster));
                }
                None => {}
            }
            self.clusters.get_mut(cluster)?.running = None;
        }

        let params = StartParams {
            cluster,
            volume: start.volume,
            pan: start.pan,
        };
        let run = ctx.player.start(&start.sound, &params).map_err(|err| {
            tracing::warn!("Failed to start {}: {err}", start.sound);
            err
        })?;

        // The voice now plays the new run only; earlier runs of the sound
        // will never report again.
        let (superseded, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records.running)
            .into_iter()
            .partition(|r| r.sound == start.sound);
        self.records.running = kept;
        for record in superseded {
            tracing::info!(
                "{} ({}) superseded by {run}, dropping its branches",
                record.sound,
                record.run
            );
            self.retire(&record, ctx);
        }

        let id = self.records.allocate_id();
        let text = start.effective_text().to_string();
        ctx.display.set_cluster_text(cluster, &text);
        self.clusters.get_mut(cluster)?.running = Some(id);
        tracing::info!("Started {} ({run}) on cluster {cluster}", start.sound);

        self.records.running.push(RunningRecord {
            id,
            tag: start.effective_tag().to_string(),
            item: start.name,
            sound: start.sound,
            run,
            cluster,
            importance: start.importance,
            text,
            started_at: now,
            next_completion: start.next_completion,
            next_termination: start.next_termination,
            release_sent: false,
            release_seen: false,
            off_cluster: false,
            termination_fired: false,
        });
        Ok(start.next_starts)
    }

    fn release_tag(&mut self, tag: &str, ctx: &mut ShowContext<'_>) {
        let mut released = 0;
        for record in self
            .records
            .running
            .iter_mut()
            .filter(|r| r.tag == tag && !r.release_sent)
        {
            tracing::info!("Releasing {} ({})", record.sound, record.run);
            ctx.player.release(&record.sound, record.run);
            record.release_sent = true;
            released += 1;
        }
        if released == 0 {
            tracing::debug!("Stop {tag}: nothing running");
        }
    }

    fn begin_wait(
        &mut self,
        item: String,
        time_to_wait: Duration,
        text: Option<String>,
        next_completion: Option<String>,
        now: Instant,
        ctx: &mut ShowContext<'_>,
    ) {
        let id = self.records.allocate_id();
        if let Some(text) = &text {
            if self.prompt_owner.is_none() {
                ctx.display.set_operator_text(text);
                self.prompt_owner = Some(id);
            }
        }
        self.timers.schedule(now + time_to_wait, id);
        self.records.waiting.push(WaitRecord {
            id,
            item,
            text,
            next_completion,
        });
    }

    fn offer(&mut self, offer: OfferRecord, ctx: &mut ShowContext<'_>) -> Result<()> {
        let slot = self.clusters.get_mut(offer.cluster)?;
        if let Some(previous) = slot.offer.replace(offer.id) {
            tracing::warn!(
                "Offer {} replaces an earlier offer on cluster {}",
                offer.item,
                offer.cluster
            );
            self.records.offering.retain(|o| o.id != previous);
        }
        if slot.running.is_none() {
            ctx.display.set_cluster_text(offer.cluster, &offer.text);
        }
        self.records.offering.push(offer);
        Ok(())
    }

    fn cease_offering(&mut self, tag: &str, ctx: &mut ShowContext<'_>) {
        let (ceased, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records.offering)
            .into_iter()
            .partition(|o| o.tag == tag);
        self.records.offering = kept;
        for offer in ceased {
            let Ok(slot) = self.clusters.get_mut(offer.cluster) else {
                continue;
            };
            if slot.offer == Some(offer.id) {
                slot.offer = None;
                if slot.running.is_none() {
                    ctx.display.clear_cluster(offer.cluster);
                }
            }
        }
    }

    fn show_prompt(&mut self, record: &OperatorRecord, ctx: &mut ShowContext<'_>) {
        ctx.display.set_operator_text(&record.text);
        self.prompt_owner = Some(record.id);
    }

    /// Hand the prompt line to the oldest Wait still showing text, or clear it.
    fn restore_prompt(&mut self, ctx: &mut ShowContext<'_>) {
        let waiting = self
            .records
            .waiting
            .iter()
            .find_map(|w| w.text.as_deref().map(|text| (w.id, text)));
        match waiting {
            Some((id, text)) => {
                ctx.display.set_operator_text(text);
                self.prompt_owner = Some(id);
            }
            None => {
                ctx.display.set_operator_text("");
                self.prompt_owner = None;
            }
        }
    }

    /// Start a sound that is not part of the script, as a MIDI or OSC
    /// trigger does. Its `next_starts` chain runs like any other.
    pub fn play_sound(
        &mut self,
        start: StartSound,
        now: Instant,
        ctx: &mut ShowContext<'_>,
    ) -> Result<()> {
        tracing::debug!("Ad hoc start of {}", start.sound);
        match self.start_sound(start, now, ctx)? {
            Some(next) => self.execute(&next, now, ctx),
            None => Ok(()),
        }
    }

    /// A voice reported `Completed` or `ReleaseStarted`.
    pub fn handle_notification(
        &mut self,
        notification: &VoiceNotification,
        now: Instant,
        ctx: &mut ShowContext<'_>,
    ) -> Result<()> {
        let Some(index) = self
            .records
            .find_run(&notification.sound, notification.run)
        else {
            tracing::warn!(
                "Ignoring {:?} from {} ({}): not running",
                notification.kind,
                notification.sound,
                notification.run
            );
            return Ok(());
        };

        let follow = match notification.kind {
            NotificationKind::ReleaseStarted => {
                let record = &mut self.records.running[index];
                record.release_seen = true;
                if record.release_sent && !record.termination_fired {
                    record.termination_fired = true;
                    record.next_termination.clone()
                } else {
                    None
                }
            }
            NotificationKind::Completed => {
                let record = self.records.running.remove(index);
                tracing::info!("{} ({}) finished", record.sound, record.run);
                self.retire(&record, ctx);
                if !record.release_sent {
                    record.next_completion
                } else if !record.termination_fired {
                    record.next_termination
                } else {
                    None
                }
            }
        };

        match follow {
            Some(next) => self.execute(&next, now, ctx),
            None => Ok(()),
        }
    }

    /// Unbind a finished sound from its cluster and the display.
    fn retire(&mut self, record: &RunningRecord, ctx: &mut ShowContext<'_>) {
        self.arbiter.forget(record.id, ctx.display);
        if record.off_cluster {
            return;
        }
        let Ok(slot) = self.clusters.get_mut(record.cluster) else {
            return;
        };
        if slot.running != Some(record.id) {
            return;
        }
        slot.running = None;
        match slot.offer.and_then(|id| self.records.offer(id)) {
            Some(offer) => ctx.display.set_cluster_text(record.cluster, &offer.text),
            None => ctx.display.clear_cluster(record.cluster),
        }
    }

    /// The cluster's Start button: run its offer.
    pub fn cluster_start(
        &mut self,
        cluster: usize,
        now: Instant,
        ctx: &mut ShowContext<'_>,
    ) -> Result<()> {
        let Some(offer) = self.clusters.get(cluster)?.offer else {
            tracing::warn!("Start on cluster {cluster}: nothing offered");
            return Ok(());
        };
        let next = self
            .records
            .offer(offer)
            .and_then(|o| o.next_to_start.clone());
        match next {
            Some(next) => self.execute(&next, now, ctx),
            None => Ok(()),
        }
    }

    /// The cluster's Stop button: release whatever plays there.
    pub fn cluster_stop(&mut self, cluster: usize, ctx: &mut ShowContext<'_>) -> Result<()> {
        let Some(id) = self.clusters.get(cluster)?.running else {
            tracing::debug!("Stop on cluster {cluster}: nothing playing");
            return Ok(());
        };
        if let Some(record) = self.records.running_mut(id) {
            if !record.release_sent {
                tracing::info!("Releasing {} from cluster {cluster}", record.sound);
                ctx.player.release(&record.sound, record.run);
                record.release_sent = true;
            }
        }
        Ok(())
    }

    /// The Play button: finish the current Operator Wait.
    pub fn operator_play(&mut self, now: Instant, ctx: &mut ShowContext<'_>) -> Result<()> {
        let Some(current) = self.records.operator_current.take() else {
            tracing::debug!("Play pressed with no Operator Wait");
            return Ok(());
        };
        tracing::info!("Operator continued from {}", current.item);

        if let Some(queued) = self.records.operator_queue.pop_front() {
            self.show_prompt(&queued, ctx);
            self.records.operator_current = Some(queued);
        } else if self.prompt_owner == Some(current.id) {
            self.restore_prompt(ctx);
        }

        match current.next_play {
            Some(next) => self.execute(&next, now, ctx),
            None => Ok(()),
        }
    }

    /// Remote "Go": run the Start Sound item numbered `cue`, or press Play
    /// when no item carries that number.
    pub fn go(&mut self, cue: u32, now: Instant, ctx: &mut ShowContext<'_>) -> Result<()> {
        let number = cue.to_string();
        match self.script.cue_item(&number).map(str::to_string) {
            Some(name) => {
                tracing::info!("Go, cue {cue} runs {name}");
                self.execute(&name, now, ctx)
            }
            None => {
                tracing::debug!("Go, cue {cue}: no numbered item, continuing");
                self.operator_play(now, ctx)
            }
        }
    }

    /// Periodic tick: fire expired Waits, then refresh the operator display.
    ///
    /// Every expired Wait runs even if an earlier one fails; the first error
    /// is returned.
    pub fn tick(&mut self, now: Instant, ctx: &mut ShowContext<'_>) -> Result<()> {
        let mut result = Ok(());
        for id in self.timers.expired(now) {
            let Some(wait) = self.records.take_wait(id) else {
                continue;
            };
            tracing::debug!("Wait {} finished", wait.item);
            if self.prompt_owner == Some(id) {
                self.restore_prompt(ctx);
            }
            if let Some(next) = wait.next_completion {
                let outcome = self.execute(&next, now, ctx);
                if result.is_ok() {
                    result = outcome;
                }
            }
        }
        self.refresh_display(now, ctx);
        result
    }

    fn refresh_display(&mut self, now: Instant, ctx: &mut ShowContext<'_>) {
        let candidates: Vec<Candidate<'_>> = self
            .records
            .running
            .iter()
            .map(|r| Candidate {
                id: r.id,
                importance: r.importance,
                text: &r.text,
                started_at: r.started_at,
            })
            .collect();
        self.arbiter.render(&candidates, now, ctx.display);
    }

    pub fn running(&self) -> &[RunningRecord] {
        &self.records.running
    }

    pub fn running_count(&self) -> usize {
        self.records.running.len()
    }

    /// Name of the Offer Sound item pending on `cluster`.
    pub fn offering_on(&self, cluster: usize) -> Option<&str> {
        let id = self.clusters.get(cluster).ok()?.offer?;
        self.records.offer(id).map(|o| o.item.as_str())
    }

    /// Sound bound to `cluster`.
    pub fn cluster_sound(&self, cluster: usize) -> Option<&str> {
        let id = self.clusters.get(cluster).ok()?.running?;
        self.records.running(id).map(|r| r.sound.as_str())
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Name of the Operator Wait whose prompt is showing.
    pub fn current_operator_wait(&self) -> Option<&str> {
        self.records
            .operator_current
            .as_ref()
            .map(|o| o.item.as_str())
    }

    pub fn queued_operator_waits(&self) -> usize {
        self.records.operator_queue.len()
    }

    pub fn is_waiting(&self) -> bool {
        !self.records.waiting.is_empty()
    }

    pub fn shown_message(&self) -> Option<RecordId> {
        self.arbiter.shown()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }
}
