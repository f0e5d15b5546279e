//! Threaded loop buffer node.
//!
//! Each node runs up to two workers:
//!
//! - an **acquisition worker** that pulls the clip from an upstream source (or
//!   walks a RIFF file directly) and forwards the bytes over a channel;
//! - a **push worker** that owns the [`LoopBuffer`] and the downstream chain
//!   outright. Control messages, acquired data and chunk production are all
//!   serialised through this one thread, so nothing is locked while a chunk is
//!   pushed downstream.
//!
//! Queries from other threads read a status snapshot the push worker publishes
//! after every change. Both workers poll a shared `is_running` flag each cycle
//! and exit without further I/O once it is cleared.

use crate::config::LoopBufferConfig;
use crate::loop_buffer::{Cycle, LoopBuffer, LoopBufferStatus, LoopSettings};
use crate::riff::RiffReader;
use crate::{Error, Result};
use crossbeam_channel::{never, select, unbounded, Receiver, Sender, TryRecvError};
use parking_lot::RwLock;
use showcue_core::{
    AtomicFlag, AudioFormat, Downstream, Pacing, PullSource, StreamItem, VoiceControl,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Where the node gets its clip from.
pub enum Acquisition {
    /// Parse a RIFF/WAVE file and copy its `data` chunks.
    Direct(PathBuf),
    /// Pull from an upstream decoder, falling back to push if it cannot be pulled.
    Pull(Box<dyn PullSource>),
    /// Wait for bytes fed through a [`PushHandle`].
    Push,
}

enum Acquired {
    Data(Vec<u8>),
    Done,
    Failed(String),
}

/// Feeds bytes into a node activated for push acquisition.
#[derive(Clone)]
pub struct PushHandle {
    tx: Sender<Acquired>,
}

impl PushHandle {
    pub fn push(&self, bytes: Vec<u8>) -> Result<()> {
        self.tx
            .send(Acquired::Data(bytes))
            .map_err(|_| Error::NotRunning)
    }

    /// Signal end of data. Buffering is also considered finished once every
    /// handle has been dropped.
    pub fn finish(&self) -> Result<()> {
        self.tx.send(Acquired::Done).map_err(|_| Error::NotRunning)
    }
}

pub struct LoopBufferNode {
    name: String,
    format: AudioFormat,
    settings: LoopSettings,
    config: LoopBufferConfig,
    control_tx: Sender<VoiceControl>,
    control_rx: Option<Receiver<VoiceControl>>,
    status: Arc<RwLock<LoopBufferStatus>>,
    running: Arc<AtomicFlag>,
    acquire_handle: Option<JoinHandle<()>>,
    push_handle: Option<JoinHandle<()>>,
}

impl LoopBufferNode {
    pub fn new(
        name: impl Into<String>,
        format: AudioFormat,
        settings: LoopSettings,
        config: LoopBufferConfig,
    ) -> Result<Self> {
        format.validate()?;
        settings.validate()?;
        let (control_tx, control_rx) = unbounded();
        Ok(Self {
            name: name.into(),
            format,
            settings,
            config,
            control_tx,
            control_rx: Some(control_rx),
            status: Arc::new(RwLock::new(LoopBufferStatus::default())),
            running: Arc::new(AtomicFlag::new(false)),
            acquire_handle: None,
            push_handle: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Start buffering and spawn the workers.
    ///
    /// Returns a [`PushHandle`] when the clip has to be pushed in.
    pub fn activate(
        &mut self,
        acquisition: Acquisition,
        downstream: Box<dyn Downstream>,
    ) -> Result<Option<PushHandle>> {
        let control_rx = self.control_rx.take().ok_or(Error::AlreadyActive)?;
        let (acq_tx, acq_rx) = unbounded();
        self.running.set(true);

        let mut push = None;
        match acquisition {
            Acquisition::Direct(path) => {
                let worker = DirectReader {
                    path,
                    format: self.format,
                };
                self.spawn_acquirer(move |ctx| worker.run(ctx), acq_tx)?;
            }
            Acquisition::Pull(source) if source.supports_pull() => {
                if source.format() != self.format {
                    tracing::warn!(
                        "{}: upstream format {:?} differs from {:?}",
                        self.name,
                        source.format(),
                        self.format
                    );
                }
                self.spawn_acquirer(move |ctx| pull_all(source, ctx), acq_tx)?;
            }
            Acquisition::Pull(_) => {
                tracing::debug!("{}: upstream cannot be pulled, waiting for pushes", self.name);
                push = Some(PushHandle { tx: acq_tx });
            }
            Acquisition::Push => push = Some(PushHandle { tx: acq_tx }),
        }

        let worker = PushWorker {
            name: self.name.clone(),
            state: LoopBuffer::new(self.format, self.settings, self.config.chunk_nanos()),
            control_rx,
            acq_rx: Some(acq_rx),
            downstream,
            status: Arc::clone(&self.status),
            running: Arc::clone(&self.running),
            pacing: self.config.pacing,
            chunk_duration: self.config.chunk_duration,
        };
        let handle = thread::Builder::new()
            .name(format!("loopbuf-push-{}", self.name))
            .spawn(move || worker.run())
            .map_err(|e| Error::WorkerSpawn(e.to_string()))?;
        self.push_handle = Some(handle);

        tracing::debug!("{}: activated", self.name);
        Ok(push)
    }

    fn spawn_acquirer<F>(&mut self, work: F, tx: Sender<Acquired>) -> Result<()>
    where
        F: FnOnce(&AcquireContext) + Send + 'static,
    {
        let ctx = AcquireContext {
            tx,
            running: Arc::clone(&self.running),
            pull_size: self.config.pull_size,
            cap: (self.settings.max_duration > 0)
                .then(|| self.format.time_to_bytes_floor(self.settings.max_duration)),
            name: self.name.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("loopbuf-pull-{}", self.name))
            .spawn(move || {
                work(&ctx);
            })
            .map_err(|e| Error::WorkerSpawn(e.to_string()))?;
        self.acquire_handle = Some(handle);
        Ok(())
    }

    /// Queue a control message for the push worker.
    pub fn control(&self, control: VoiceControl) -> Result<()> {
        self.control_tx
            .send(control)
            .map_err(|_| Error::NotRunning)
    }

    pub fn snapshot(&self) -> LoopBufferStatus {
        *self.status.read()
    }

    pub fn is_active(&self) -> bool {
        self.running.get()
    }

    /// Clear `is_running` and join both workers.
    pub fn deactivate(&mut self) {
        self.running.set(false);
        if let Some(handle) = self.acquire_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.push_handle.take() {
            let _ = handle.join();
        }
    }

    /// Join the workers without cancelling them, after a `Shutdown` has been sent.
    pub fn join(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.running.get() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        self.deactivate();
        true
    }
}

impl Drop for LoopBufferNode {
    fn drop(&mut self) {
        self.deactivate();
    }
}

// =============================================================================
// Acquisition
// =============================================================================

struct AcquireContext {
    tx: Sender<Acquired>,
    running: Arc<AtomicFlag>,
    pull_size: usize,
    cap: Option<u64>,
    name: String,
}

impl AcquireContext {
    fn below_cap(&self, offset: u64) -> bool {
        self.cap.map_or(true, |cap| offset < cap)
    }

    /// False once the push worker has gone away.
    fn send(&self, acquired: Acquired) -> bool {
        self.tx.send(acquired).is_ok()
    }
}

fn pull_all(mut source: Box<dyn PullSource>, ctx: &AcquireContext) {
    let mut offset = 0u64;
    while ctx.running.get() && ctx.below_cap(offset) {
        match source.pull(offset, ctx.pull_size) {
            Ok(Some(bytes)) if !bytes.is_empty() => {
                offset += bytes.len() as u64;
                if !ctx.send(Acquired::Data(bytes)) {
                    return;
                }
            }
            Ok(_) => break,
            Err(err) => {
                tracing::warn!("{}: pull failed at byte {}: {}", ctx.name, offset, err);
                ctx.send(Acquired::Failed(err.to_string()));
                return;
            }
        }
    }
    tracing::debug!("{}: pulled {} bytes", ctx.name, offset);
    ctx.send(Acquired::Done);
}

struct DirectReader {
    path: PathBuf,
    format: AudioFormat,
}

impl DirectReader {
    fn run(self, ctx: &AcquireContext) {
        match self.read(ctx) {
            Ok(total) => {
                tracing::debug!("{}: read {} data bytes from {:?}", ctx.name, total, self.path);
                ctx.send(Acquired::Done);
            }
            Err(err) => {
                tracing::warn!("{}: reading {:?} failed: {}", ctx.name, self.path, err);
                ctx.send(Acquired::Failed(err.to_string()));
            }
        }
    }

    fn read(&self, ctx: &AcquireContext) -> Result<u64> {
        let mut reader = RiffReader::open(&self.path)?;
        let mut buf = vec![0u8; ctx.pull_size];
        let mut total = 0u64;
        while ctx.running.get() && ctx.below_cap(total) {
            let n = reader.read_data(&mut buf)?;
            if n == 0 {
                break;
            }
            if let Some(found) = reader.format() {
                if found != self.format {
                    return Err(Error::FormatMismatch {
                        expected: self.format,
                        found,
                    });
                }
            }
            total += n as u64;
            if !ctx.send(Acquired::Data(buf[..n].to_vec())) {
                break;
            }
        }
        Ok(total)
    }
}

// =============================================================================
// Push worker
// =============================================================================

struct PushWorker {
    name: String,
    state: LoopBuffer,
    control_rx: Receiver<VoiceControl>,
    acq_rx: Option<Receiver<Acquired>>,
    downstream: Box<dyn Downstream>,
    status: Arc<RwLock<LoopBufferStatus>>,
    running: Arc<AtomicFlag>,
    pacing: Pacing,
    chunk_duration: Duration,
}

impl PushWorker {
    fn run(mut self) {
        // Real-time pacing is anchored once buffering finishes.
        let mut anchor: Option<Instant> = None;
        while self.running.get() {
            if !self.process_pending() {
                break;
            }

            if !self.state.is_buffer_filled() && !self.state.shutdown_requested() {
                self.wait_for_input(Instant::now() + self.chunk_duration);
                continue;
            }
            let epoch = *anchor.get_or_insert_with(|| {
                let played = Duration::from_nanos(self.state.local_clock());
                let now = Instant::now();
                now.checked_sub(played).unwrap_or(now)
            });

            let (item, paced, extra) = match self.state.next_cycle() {
                Cycle::Data(chunk) => (
                    StreamItem::Chunk(chunk),
                    self.pacing == Pacing::RealTime,
                    None,
                ),
                Cycle::Silence { chunk, completed } => (
                    StreamItem::Chunk(chunk),
                    true,
                    completed.then_some(StreamItem::Completed),
                ),
                Cycle::EndOfStream => {
                    self.publish();
                    if let Err(err) = self.downstream.push(StreamItem::EndOfStream) {
                        tracing::warn!("{}: end marker not delivered: {}", self.name, err);
                    }
                    tracing::debug!("{}: end of stream", self.name);
                    break;
                }
            };
            self.publish();

            if !self.send(item) {
                break;
            }
            if let Some(extra) = extra {
                if !self.send(extra) {
                    break;
                }
            }

            if paced {
                let deadline = match self.pacing {
                    Pacing::RealTime => epoch + Duration::from_nanos(self.state.local_clock()),
                    Pacing::Free => Instant::now() + self.chunk_duration,
                };
                self.wait_for_input(deadline);
            }
        }
        self.running.set(false);
    }

    fn send(&mut self, item: StreamItem) -> bool {
        match self.downstream.push(item) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("{}: downstream refused data, stopping: {}", self.name, err);
                false
            }
        }
    }

    /// Drain both channels without blocking. False when the node is gone.
    fn process_pending(&mut self) -> bool {
        loop {
            match self.control_rx.try_recv() {
                Ok(control) => {
                    if !self.apply_control(control) {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
        while let Some(rx) = &self.acq_rx {
            match rx.try_recv() {
                Ok(acquired) => self.apply_acquired(acquired),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.acq_rx = None;
                    self.finish_buffering();
                }
            }
        }
        true
    }

    /// Block on either channel until `deadline`, handling whatever arrives.
    fn wait_for_input(&mut self, deadline: Instant) {
        let idle = never();
        let control_rx = self.control_rx.clone();
        loop {
            let now = Instant::now();
            if now >= deadline || !self.running.get() {
                return;
            }
            let acq_rx = self.acq_rx.clone().unwrap_or_else(|| idle.clone());
            select! {
                recv(control_rx) -> msg => match msg {
                    Ok(control) => {
                        if !self.apply_control(control) {
                            return;
                        }
                    }
                    Err(_) => return,
                },
                recv(acq_rx) -> msg => match msg {
                    Ok(acquired) => self.apply_acquired(acquired),
                    Err(_) => {
                        self.acq_rx = None;
                        self.finish_buffering();
                    }
                },
                default(deadline - now) => return,
            }
        }
    }

    fn apply_control(&mut self, control: VoiceControl) -> bool {
        tracing::debug!("{}: control {:?}", self.name, control);
        self.state.handle_control(&control);
        self.publish();
        self.send(StreamItem::Control(control))
    }

    fn apply_acquired(&mut self, acquired: Acquired) {
        match acquired {
            Acquired::Data(bytes) => {
                self.state.accept(&bytes);
                if self.state.at_cap() {
                    self.finish_buffering();
                }
            }
            Acquired::Done => self.finish_buffering(),
            Acquired::Failed(reason) => {
                tracing::warn!(
                    "{}: acquisition failed ({}), playing what was captured",
                    self.name,
                    reason
                );
                self.finish_buffering();
            }
        }
    }

    fn finish_buffering(&mut self) {
        if self.state.finish_buffering() {
            self.publish();
        }
    }

    fn publish(&self) {
        *self.status.write() = self.state.status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;
    use showcue_core::{ChannelSink, RunId, SampleFormat};

    const WAIT: Duration = Duration::from_secs(5);

    fn format() -> AudioFormat {
        AudioFormat::new(SampleFormat::S16LE, 1, 1000)
    }

    fn node(settings: LoopSettings) -> LoopBufferNode {
        paced_node(settings, Pacing::Free)
    }

    fn paced_node(settings: LoopSettings, pacing: Pacing) -> LoopBufferNode {
        let config = LoopBufferConfig {
            chunk_duration: Duration::from_millis(10),
            pull_size: 8,
            pacing,
        };
        LoopBufferNode::new("test", format(), settings, config).unwrap()
    }

    fn sink() -> (Box<dyn Downstream>, Receiver<StreamItem>) {
        let (tx, rx) = unbounded();
        (Box::new(ChannelSink::new(tx)), rx)
    }

    /// Collect data bytes until `Completed` arrives.
    fn until_completed(rx: &Receiver<StreamItem>) -> Vec<u8> {
        let mut data = Vec::new();
        let mut started = false;
        loop {
            match rx.recv_timeout(WAIT).expect("node stalled") {
                StreamItem::Control(VoiceControl::Start { .. }) => started = true,
                StreamItem::Chunk(chunk) if started => {
                    if chunk.data.iter().any(|&b| b != 0) {
                        data.extend(chunk.data)
                    }
                }
                StreamItem::Completed => return data,
                _ => {}
            }
        }
    }

    struct VecSource {
        data: Vec<u8>,
        pullable: bool,
    }

    impl PullSource for VecSource {
        fn format(&self) -> AudioFormat {
            format()
        }

        fn supports_pull(&self) -> bool {
            self.pullable
        }

        fn pull(&mut self, offset: u64, len: usize) -> showcue_core::Result<Option<Vec<u8>>> {
            let start = offset as usize;
            if start >= self.data.len() {
                return Ok(None);
            }
            let end = (start + len).min(self.data.len());
            Ok(Some(self.data[start..end].to_vec()))
        }
    }

    fn clip(frames: i16) -> Vec<u8> {
        (1..=frames).flat_map(|i| i.to_le_bytes()).collect()
    }

    #[test]
    fn test_pull_acquisition_plays_whole_clip() {
        let mut node = node(LoopSettings::default());
        let (downstream, rx) = sink();
        let source = VecSource {
            data: clip(25),
            pullable: true,
        };
        assert!(node
            .activate(Acquisition::Pull(Box::new(source)), downstream)
            .unwrap()
            .is_none());
        node.control(VoiceControl::Start { run: RunId(1) }).unwrap();
        assert_eq!(until_completed(&rx), clip(25));
        assert!(node.snapshot().completed);
    }

    #[test]
    fn test_non_pullable_source_falls_back_to_push() {
        let mut node = node(LoopSettings::default());
        let (downstream, rx) = sink();
        let source = VecSource {
            data: Vec::new(),
            pullable: false,
        };
        let push = node
            .activate(Acquisition::Pull(Box::new(source)), downstream)
            .unwrap()
            .expect("push handle");
        push.push(clip(6)).unwrap();
        push.finish().unwrap();
        node.control(VoiceControl::Start { run: RunId(1) }).unwrap();
        assert_eq!(until_completed(&rx), clip(6));
    }

    #[test]
    fn test_push_respects_cap_and_discards_late_data() {
        let settings = LoopSettings {
            max_duration: 4_000_000,
            ..Default::default()
        };
        let mut node = node(settings);
        let (downstream, rx) = sink();
        let push = node.activate(Acquisition::Push, downstream).unwrap().unwrap();
        push.push(clip(10)).unwrap();
        push.push(clip(10)).unwrap();
        node.control(VoiceControl::Start { run: RunId(1) }).unwrap();
        assert_eq!(until_completed(&rx), clip(4));
        assert_eq!(node.snapshot().buffer_len, 8);
    }

    #[test]
    fn test_dropped_push_handle_finishes_buffering() {
        let mut node = node(LoopSettings::default());
        let (downstream, rx) = sink();
        let push = node.activate(Acquisition::Push, downstream).unwrap().unwrap();
        push.push(clip(3)).unwrap();
        drop(push);
        node.control(VoiceControl::Start { run: RunId(1) }).unwrap();
        assert_eq!(until_completed(&rx), clip(3));
    }

    #[test]
    fn test_shutdown_emits_single_end_marker() {
        let mut node = node(LoopSettings::default());
        let (downstream, rx) = sink();
        let push = node.activate(Acquisition::Push, downstream).unwrap().unwrap();
        push.finish().unwrap();
        node.control(VoiceControl::Shutdown).unwrap();
        assert!(node.join(WAIT));

        let items: Vec<StreamItem> = rx.try_iter().collect();
        let ends = items
            .iter()
            .filter(|item| matches!(item, StreamItem::EndOfStream))
            .count();
        assert_eq!(ends, 1);
        assert_eq!(items.last(), Some(&StreamItem::EndOfStream));
    }

    #[test]
    fn test_activate_twice_fails() {
        let mut node = node(LoopSettings::default());
        let (downstream, _rx) = sink();
        node.activate(Acquisition::Push, downstream).unwrap();
        let (downstream, _rx2) = sink();
        assert!(matches!(
            node.activate(Acquisition::Push, downstream),
            Err(Error::AlreadyActive)
        ));
    }

    #[test]
    fn test_missing_file_plays_empty_clip() {
        let mut node = node(LoopSettings::default());
        let (downstream, rx) = sink();
        node.activate(
            Acquisition::Direct(PathBuf::from("/nonexistent/showcue.wav")),
            downstream,
        )
        .unwrap();
        node.control(VoiceControl::Start { run: RunId(1) }).unwrap();
        assert!(until_completed(&rx).is_empty());
    }

    #[test]
    fn test_restart_after_completion() {
        let mut node = node(LoopSettings::default());
        let (downstream, rx) = sink();
        let push = node.activate(Acquisition::Push, downstream).unwrap().unwrap();
        push.push(clip(5)).unwrap();
        push.finish().unwrap();
        node.control(VoiceControl::Start { run: RunId(1) }).unwrap();
        assert_eq!(until_completed(&rx), clip(5));
        node.control(VoiceControl::Start { run: RunId(2) }).unwrap();
        assert_eq!(until_completed(&rx), clip(5));
        assert_eq!(node.snapshot().run, RunId(2));
    }

    #[test]
    fn test_deactivate_stops_workers() {
        let mut node = node(LoopSettings::default());
        let (downstream, _rx) = sink();
        node.activate(Acquisition::Push, downstream).unwrap();
        assert!(node.is_active());
        node.deactivate();
        assert!(!node.is_active());
    }

    #[test]
    fn test_real_time_pacing_starts_after_slow_buffering() {
        let mut node = paced_node(LoopSettings::default(), Pacing::RealTime);
        let (downstream, rx) = sink();
        let push = node.activate(Acquisition::Push, downstream).unwrap().unwrap();
        // 400 ms at 1 kHz, buffered well after the worker started.
        push.push(clip(400)).unwrap();
        node.control(VoiceControl::Start { run: RunId(1) }).unwrap();
        thread::sleep(Duration::from_millis(300));
        push.finish().unwrap();

        let finished = Instant::now();
        assert_eq!(until_completed(&rx), clip(400));
        let elapsed = finished.elapsed();
        assert!(
            elapsed >= Duration::from_millis(350),
            "400 ms clip completed after {elapsed:?}"
        );
    }
}
