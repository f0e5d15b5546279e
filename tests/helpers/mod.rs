//! Test helpers and fixtures for showcue integration tests
//!
//! Fixtures are real WAV files written with hound into a scratch directory,
//! and the engine runs its voices on real worker threads with short chunks.
//! The recording display and bus share their state through an `Arc`, so a
//! clone handed to the engine can be inspected from the test.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain)
//! - `INT16_EPSILON`: Anything that went through a 16-bit fixture
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use parking_lot::Mutex;
use showcue::prelude::*;
use showcue::VoiceNotification;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;

/// Fixture sample rate. Low, so fixtures stay small.
pub const TEST_SAMPLE_RATE: u32 = 8000;

/// Chunk length for test engines.
pub const TEST_CHUNK: Duration = Duration::from_millis(10);

/// Upper bound on any wait for a voice to do something.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Route `tracing` output to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Engine config with short chunks and a fast display refresh.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        cluster_count: 4,
        chunk_duration: TEST_CHUNK,
        display_refresh: Duration::from_millis(10),
        ..Default::default()
    }
}

pub fn fixture_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create fixture directory")
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: u32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32 * 0.5
        })
        .collect()
}

/// Write interleaved samples as a 16-bit PCM WAV file.
pub fn write_wav_i16(path: &Path, channels: u16, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV");
    for &s in samples {
        writer
            .write_sample((s * i16::MAX as f32) as i16)
            .expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV");
}

/// A mono sine clip of `duration` written into `dir`.
pub fn sine_clip(dir: &Path, name: &str, duration: Duration) -> PathBuf {
    let path = dir.join(format!("{name}.wav"));
    let frames = (duration.as_secs_f64() * TEST_SAMPLE_RATE as f64) as usize;
    write_wav_i16(&path, 1, &generate_sine(440.0, TEST_SAMPLE_RATE, frames));
    path
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

// =============================================================================
// Recording display
// =============================================================================

#[derive(Debug, Default)]
pub struct DisplayState {
    pub operator_text: String,
    /// Every prompt ever shown, in order.
    pub prompts: Vec<String>,
    pub clusters: HashMap<usize, String>,
    pub levels: HashMap<usize, (String, String)>,
    pub message: Option<(RecordId, String)>,
}

#[derive(Clone, Default)]
pub struct RecordingDisplay {
    state: Arc<Mutex<DisplayState>>,
}

impl RecordingDisplay {
    pub fn operator_text(&self) -> String {
        self.state.lock().operator_text.clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().prompts.clone()
    }

    pub fn cluster_text(&self, cluster: usize) -> Option<String> {
        self.state.lock().clusters.get(&cluster).cloned()
    }

    pub fn cluster_levels(&self, cluster: usize) -> Option<(String, String)> {
        self.state.lock().levels.get(&cluster).cloned()
    }

    pub fn message(&self) -> Option<String> {
        self.state.lock().message.as_ref().map(|(_, text)| text.clone())
    }
}

impl OperatorDisplay for RecordingDisplay {
    fn show_message(&mut self, id: RecordId, text: &str) {
        self.state.lock().message = Some((id, text.to_string()));
    }

    fn remove_message(&mut self, id: RecordId) {
        let mut state = self.state.lock();
        if state.message.as_ref().is_some_and(|(shown, _)| *shown == id) {
            state.message = None;
        }
    }

    fn set_operator_text(&mut self, text: &str) {
        let mut state = self.state.lock();
        state.operator_text = text.to_string();
        if !text.is_empty() {
            state.prompts.push(text.to_string());
        }
    }

    fn set_cluster_text(&mut self, cluster: usize, text: &str) {
        self.state.lock().clusters.insert(cluster, text.to_string());
    }

    fn clear_cluster(&mut self, cluster: usize) {
        self.state.lock().clusters.remove(&cluster);
    }

    fn set_cluster_levels(&mut self, cluster: usize, volume: &str, pan: &str) {
        self.state
            .lock()
            .levels
            .insert(cluster, (volume.to_string(), pan.to_string()));
    }
}

// =============================================================================
// Recording bus
// =============================================================================

#[derive(Debug, Default)]
struct BusState {
    /// Left channel of every block, per voice.
    left: HashMap<String, Vec<f32>>,
    right: HashMap<String, Vec<f32>>,
    ended: Vec<String>,
}

#[derive(Clone, Default)]
pub struct RecordingBus {
    state: Arc<Mutex<BusState>>,
}

impl RecordingBus {
    pub fn left(&self, voice: &str) -> Vec<f32> {
        self.state.lock().left.get(voice).cloned().unwrap_or_default()
    }

    pub fn right(&self, voice: &str) -> Vec<f32> {
        self.state.lock().right.get(voice).cloned().unwrap_or_default()
    }

    pub fn ended(&self) -> Vec<String> {
        self.state.lock().ended.clone()
    }
}

impl MixBus for RecordingBus {
    fn mix(&self, voice: &str, block: &StereoBlock) {
        let mut state = self.state.lock();
        state
            .left
            .entry(voice.to_string())
            .or_default()
            .extend(block.frames.iter().map(|(l, _)| *l));
        state
            .right
            .entry(voice.to_string())
            .or_default()
            .extend(block.frames.iter().map(|(_, r)| *r));
    }

    fn end_of_stream(&self, voice: &str) {
        self.state.lock().ended.push(voice.to_string());
    }
}

// =============================================================================
// Driving the engine
// =============================================================================

/// Pump `process_events` until `done` holds or the timeout passes.
/// Returns every notification handled on the way, and whether `done` held.
pub fn pump_until(
    engine: &mut ShowEngine,
    mut done: impl FnMut(&ShowEngine) -> bool,
) -> (Vec<VoiceNotification>, bool) {
    let deadline = Instant::now() + TEST_TIMEOUT;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        seen.extend(engine.process_events(Instant::now()).expect("process_events failed"));
        if done(engine) {
            return (seen, true);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    (seen, false)
}

/// Pump `process_events` for a fixed time.
pub fn pump_for(engine: &mut ShowEngine, duration: Duration) -> Vec<VoiceNotification> {
    let deadline = Instant::now() + duration;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        seen.extend(engine.process_events(Instant::now()).expect("process_events failed"));
        std::thread::sleep(Duration::from_millis(5));
    }
    seen
}
