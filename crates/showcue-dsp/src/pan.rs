//! Live volume and pan, and the conversion to stereo for the mix bus.

use showcue_core::{
    Arc, AtomicDouble, AudioFormat, Chunk, Downstream, LevelMeter, MixBus, StereoBlock,
    StreamItem,
};

/// Live volume and pan for one voice.
///
/// Shared with the operator controls, which may change either value while
/// the voice plays. Pan runs from -1.0 (left) through 0.0 to 1.0 (right).
#[derive(Debug)]
pub struct PanGain {
    volume: AtomicDouble,
    pan: AtomicDouble,
}

impl Default for PanGain {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl PanGain {
    pub fn new(volume: f64, pan: f64) -> Self {
        Self {
            volume: AtomicDouble::new(volume.max(0.0)),
            pan: AtomicDouble::new(pan.clamp(-1.0, 1.0)),
        }
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.volume.get()
    }

    pub fn set_volume(&self, volume: f64) {
        self.volume.set(volume.max(0.0));
    }

    #[inline]
    pub fn pan(&self) -> f64 {
        self.pan.get()
    }

    pub fn set_pan(&self, pan: f64) {
        self.pan.set(pan.clamp(-1.0, 1.0));
    }

    /// Linear pan law for a mono source.
    pub fn mono_gains(&self) -> (f64, f64) {
        let volume = self.volume();
        let right = 0.5 * (1.0 + self.pan());
        (volume * (1.0 - right), volume * right)
    }

    /// Balance for a stereo source: panning attenuates the opposite side only.
    pub fn stereo_gains(&self) -> (f64, f64) {
        let volume = self.volume();
        let pan = self.pan();
        (volume * (1.0 - pan.max(0.0)), volume * (1.0 + pan.min(0.0)))
    }

    /// Stereo frames for `chunk`. Channels past the second are dropped.
    pub fn to_stereo(&self, format: &AudioFormat, chunk: &Chunk) -> StereoBlock {
        let sample = format.sample_format;
        let width = sample.bytes();
        let mono = format.channels == 1;
        let (left_gain, right_gain) = if mono {
            self.mono_gains()
        } else {
            self.stereo_gains()
        };

        let frames = chunk
            .data
            .chunks_exact(format.frame_bytes())
            .map(|frame| {
                let left = sample.read_sample(&frame[..width]);
                let right = if mono {
                    left
                } else {
                    sample.read_sample(&frame[width..2 * width])
                };
                ((left * left_gain) as f32, (right * right_gain) as f32)
            })
            .collect();

        StereoBlock {
            frames,
            timestamp: chunk.timestamp,
            duration: chunk.duration,
        }
    }
}

/// Final stage of a voice chain: gain, pan, metering, then the mix bus.
pub struct PanGainNode {
    voice: String,
    format: AudioFormat,
    controls: Arc<PanGain>,
    meter: Arc<LevelMeter>,
    bus: Arc<dyn MixBus>,
}

impl PanGainNode {
    pub fn new(
        voice: impl Into<String>,
        format: AudioFormat,
        controls: Arc<PanGain>,
        meter: Arc<LevelMeter>,
        bus: Arc<dyn MixBus>,
    ) -> Self {
        Self {
            voice: voice.into(),
            format,
            controls,
            meter,
            bus,
        }
    }
}

impl Downstream for PanGainNode {
    fn push(&mut self, item: StreamItem) -> showcue_core::Result<()> {
        match item {
            StreamItem::Chunk(chunk) => {
                let block = self.controls.to_stereo(&self.format, &chunk);
                self.meter.update(&block);
                self.bus.mix(&self.voice, &block);
            }
            StreamItem::EndOfStream => self.bus.end_of_stream(&self.voice),
            StreamItem::Control(_) | StreamItem::Completed => {}
        }
        Ok(())
    }
}

/// Label text for a volume slider, e.g. `Vol  80%`.
pub fn volume_label(volume: f64) -> String {
    format!("Vol{:4.0}%", volume * 100.0)
}

/// Label text for a pan slider: `Center`, `Left   50%` or `Right  25%`.
pub fn pan_label(pan: f64) -> String {
    if pan == 0.0 {
        "Center".to_string()
    } else if pan < 0.0 {
        format!("Left {:4.0}%", -pan * 100.0)
    } else {
        format!("Right{:4.0}%", pan * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use showcue_core::SampleFormat;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBus {
        blocks: Mutex<Vec<(String, StereoBlock)>>,
        ended: Mutex<Vec<String>>,
    }

    impl MixBus for RecordingBus {
        fn mix(&self, voice: &str, block: &StereoBlock) {
            self.blocks
                .lock()
                .unwrap()
                .push((voice.to_string(), block.clone()));
        }

        fn end_of_stream(&self, voice: &str) {
            self.ended.lock().unwrap().push(voice.to_string());
        }
    }

    fn f32_chunk(samples: &[f32]) -> Chunk {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Chunk::new(data, 0, 0)
    }

    // =========================================================================
    // Pan law
    // =========================================================================

    #[test]
    fn test_mono_centre_splits_evenly() {
        let gains = PanGain::default().mono_gains();
        assert_relative_eq!(gains.0, 0.5);
        assert_relative_eq!(gains.1, 0.5);
    }

    #[test]
    fn test_mono_hard_left() {
        let controls = PanGain::new(0.8, -1.0);
        let (left, right) = controls.mono_gains();
        assert_relative_eq!(left, 0.8);
        assert_relative_eq!(right, 0.0);
    }

    #[test]
    fn test_stereo_balance_keeps_near_side() {
        let controls = PanGain::new(1.0, 0.25);
        let (left, right) = controls.stereo_gains();
        assert_relative_eq!(left, 0.75);
        assert_relative_eq!(right, 1.0);

        controls.set_pan(-0.5);
        let (left, right) = controls.stereo_gains();
        assert_relative_eq!(left, 1.0);
        assert_relative_eq!(right, 0.5);
    }

    #[test]
    fn test_setters_clamp() {
        let controls = PanGain::default();
        controls.set_pan(3.0);
        controls.set_volume(-1.0);
        assert_relative_eq!(controls.pan(), 1.0);
        assert_relative_eq!(controls.volume(), 0.0);
    }

    #[test]
    fn test_extra_channels_dropped() {
        let format = AudioFormat::new(SampleFormat::F32LE, 4, 48000);
        let block = PanGain::default().to_stereo(&format, &f32_chunk(&[0.1, 0.2, 0.9, 0.9]));
        assert_eq!(block.frames.len(), 1);
        assert_relative_eq!(block.frames[0].0, 0.1);
        assert_relative_eq!(block.frames[0].1, 0.2);
    }

    // =========================================================================
    // Node
    // =========================================================================

    #[test]
    fn test_node_meters_and_mixes() {
        let bus = Arc::new(RecordingBus::default());
        let meter = Arc::new(LevelMeter::default());
        let format = AudioFormat::new(SampleFormat::F32LE, 1, 48000);
        let mut node = PanGainNode::new(
            "rain",
            format,
            Arc::new(PanGain::new(1.0, 1.0)),
            meter.clone(),
            bus.clone(),
        );

        node.push(StreamItem::Chunk(f32_chunk(&[0.5, -0.5])))
            .unwrap();
        node.push(StreamItem::Completed).unwrap();
        node.push(StreamItem::EndOfStream).unwrap();

        let blocks = bus.blocks.lock().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].0, "rain");
        assert_eq!(blocks[0].1.frames, vec![(0.0, 0.5), (0.0, -0.5)]);
        assert_relative_eq!(meter.levels().peak_right, 0.5);
        assert_relative_eq!(meter.levels().peak_left, 0.0);
        assert_eq!(*bus.ended.lock().unwrap(), vec!["rain".to_string()]);
    }

    // =========================================================================
    // Labels
    // =========================================================================

    #[test]
    fn test_labels() {
        assert_eq!(volume_label(0.8), "Vol  80%");
        assert_eq!(volume_label(1.0), "Vol 100%");
        assert_eq!(pan_label(0.0), "Center");
        assert_eq!(pan_label(-0.5), "Left   50%");
        assert_eq!(pan_label(0.25), "Right  25%");
    }
}
