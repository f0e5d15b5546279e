//! Lock-free level tap (RMS, peak and decaying peak per channel).
//!
//! The voice thread calls [`LevelMeter::update`] once per block; the display
//! side reads a [`StereoLevels`] snapshot whenever it redraws.

use crate::lockfree::AtomicFloat;
use crate::time::NANOS_PER_SECOND;
use crate::StereoBlock;

/// Default fall-off of the decaying peak, in dB per second.
pub const DEFAULT_PEAK_FALLOFF_DB: f32 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoLevels {
    pub rms_left: f32,
    pub rms_right: f32,
    pub peak_left: f32,
    pub peak_right: f32,
    pub decay_left: f32,
    pub decay_right: f32,
}

pub struct LevelMeter {
    rms_left: AtomicFloat,
    rms_right: AtomicFloat,
    peak_left: AtomicFloat,
    peak_right: AtomicFloat,
    decay_left: AtomicFloat,
    decay_right: AtomicFloat,
    falloff_db: f32,
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new(DEFAULT_PEAK_FALLOFF_DB)
    }
}

impl LevelMeter {
    pub fn new(falloff_db: f32) -> Self {
        Self {
            rms_left: AtomicFloat::default(),
            rms_right: AtomicFloat::default(),
            peak_left: AtomicFloat::default(),
            peak_right: AtomicFloat::default(),
            decay_left: AtomicFloat::default(),
            decay_right: AtomicFloat::default(),
            falloff_db,
        }
    }

    pub fn update(&self, block: &StereoBlock) {
        if block.frames.is_empty() {
            return;
        }
        let (mut sum_l, mut sum_r, mut peak_l, mut peak_r) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        for &(l, r) in &block.frames {
            sum_l += l * l;
            sum_r += r * r;
            peak_l = peak_l.max(l.abs());
            peak_r = peak_r.max(r.abs());
        }
        let n = block.frames.len() as f32;
        self.rms_left.set((sum_l / n).sqrt());
        self.rms_right.set((sum_r / n).sqrt());
        self.peak_left.set(peak_l);
        self.peak_right.set(peak_r);

        let seconds = block.duration as f32 / NANOS_PER_SECOND as f32;
        let factor = 10f32.powf(-self.falloff_db * seconds / 20.0);
        self.decay_left.set(peak_l.max(self.decay_left.get() * factor));
        self.decay_right.set(peak_r.max(self.decay_right.get() * factor));
    }

    pub fn levels(&self) -> StereoLevels {
        StereoLevels {
            rms_left: self.rms_left.get(),
            rms_right: self.rms_right.get(),
            peak_left: self.peak_left.get(),
            peak_right: self.peak_right.get(),
            decay_left: self.decay_left.get(),
            decay_right: self.decay_right.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn block(frames: Vec<(f32, f32)>, duration: u64) -> StereoBlock {
        StereoBlock {
            frames,
            timestamp: 0,
            duration,
        }
    }

    #[test]
    fn test_rms_and_peak() {
        let meter = LevelMeter::default();
        meter.update(&block(vec![(0.5, -1.0), (-0.5, 1.0)], 40_000_000));
        let levels = meter.levels();
        assert_relative_eq!(levels.rms_left, 0.5, epsilon = 1e-6);
        assert_relative_eq!(levels.rms_right, 1.0, epsilon = 1e-6);
        assert_relative_eq!(levels.peak_right, 1.0);
        assert_relative_eq!(levels.decay_left, 0.5);
    }

    #[test]
    fn test_decaying_peak_falls_off() {
        let meter = LevelMeter::new(20.0);
        meter.update(&block(vec![(1.0, 1.0)], NANOS_PER_SECOND));
        meter.update(&block(vec![(0.0, 0.0)], NANOS_PER_SECOND));
        let levels = meter.levels();
        // 20 dB over one second is a factor of ten.
        assert_relative_eq!(levels.decay_left, 0.1, epsilon = 1e-5);
        assert_eq!(levels.peak_left, 0.0);
    }
}
