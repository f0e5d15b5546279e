//! Raw sample formats and the byte/time arithmetic built on them.
//!
//! Voices move interleaved little-endian bytes rather than decoded samples, so
//! every position the loop buffer keeps (drain level, loop bounds, the
//! max-duration cap) is a byte offset. These helpers convert between stream
//! time in nanoseconds and byte offsets, always landing on a frame boundary.

use crate::time::NANOS_PER_SECOND;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Interleaved sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    U8,
    S16LE,
    S24LE,
    S32LE,
    F32LE,
    F64LE,
}

impl SampleFormat {
    /// Bits per sample.
    pub fn width(self) -> u32 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::S16LE => 16,
            SampleFormat::S24LE => 24,
            SampleFormat::S32LE | SampleFormat::F32LE => 32,
            SampleFormat::F64LE => 64,
        }
    }

    #[inline]
    pub fn bytes(self) -> usize {
        self.width() as usize / 8
    }

    /// Byte value that encodes silence. Unsigned 8-bit audio is centred on 128.
    #[inline]
    pub fn silence_byte(self) -> u8 {
        match self {
            SampleFormat::U8 => 128,
            _ => 0,
        }
    }

    /// Decode one sample to the nominal -1.0..1.0 range.
    ///
    /// `bytes` must hold at least [`SampleFormat::bytes`] bytes.
    pub fn read_sample(self, bytes: &[u8]) -> f64 {
        match self {
            SampleFormat::U8 => (bytes[0] as f64 - 128.0) / 128.0,
            SampleFormat::S16LE => i16::from_le_bytes([bytes[0], bytes[1]]) as f64 / 32768.0,
            SampleFormat::S24LE => {
                let raw = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
                raw as f64 / 8_388_608.0
            }
            SampleFormat::S32LE => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
                    / 2_147_483_648.0
            }
            SampleFormat::F32LE => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            SampleFormat::F64LE => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(raw)
            }
        }
    }

    /// Encode one sample, clamping integer formats to their range.
    pub fn write_sample(self, value: f64, out: &mut [u8]) {
        match self {
            SampleFormat::U8 => {
                out[0] = (value * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8;
            }
            SampleFormat::S16LE => {
                let v = (value * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
                out[..2].copy_from_slice(&v.to_le_bytes());
            }
            SampleFormat::S24LE => {
                let v = (value * 8_388_608.0)
                    .round()
                    .clamp(-8_388_608.0, 8_388_607.0) as i32;
                out[..3].copy_from_slice(&v.to_le_bytes()[..3]);
            }
            SampleFormat::S32LE => {
                let v = (value * 2_147_483_648.0)
                    .round()
                    .clamp(-2_147_483_648.0, 2_147_483_647.0) as i32;
                out[..4].copy_from_slice(&v.to_le_bytes());
            }
            SampleFormat::F32LE => out[..4].copy_from_slice(&(value as f32).to_le_bytes()),
            SampleFormat::F64LE => out[..8].copy_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Layout of a voice's byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub rate: u32,
}

impl AudioFormat {
    pub fn new(sample_format: SampleFormat, channels: u16, rate: u32) -> Self {
        Self {
            sample_format,
            channels,
            rate,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(Error::InvalidFormat("channel count is zero".into()));
        }
        if self.rate == 0 {
            return Err(Error::InvalidFormat("sample rate is zero".into()));
        }
        Ok(())
    }

    /// Bytes per frame: width x channels / 8.
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.sample_format.width() as usize * self.channels as usize / 8
    }

    #[inline]
    pub fn bytes_per_second(&self) -> u64 {
        self.frame_bytes() as u64 * self.rate as u64
    }

    /// Duration of one frame in nanoseconds.
    #[inline]
    pub fn frame_interval(&self) -> f64 {
        NANOS_PER_SECOND as f64 / self.rate as f64
    }

    /// Byte offset of the last whole frame at or before `ns`.
    pub fn time_to_bytes_floor(&self, ns: u64) -> u64 {
        let frames = (ns as u128 * self.rate as u128) / NANOS_PER_SECOND as u128;
        frames as u64 * self.frame_bytes() as u64
    }

    /// Byte offset of the first whole frame at or after `ns`.
    pub fn time_to_bytes_ceil(&self, ns: u64) -> u64 {
        let scaled = ns as u128 * self.rate as u128;
        let frames = scaled.div_ceil(NANOS_PER_SECOND as u128);
        frames as u64 * self.frame_bytes() as u64
    }

    /// Stream time of a byte offset. Partial frames are ignored.
    pub fn bytes_to_time(&self, bytes: u64) -> u64 {
        let frames = bytes / self.frame_bytes() as u64;
        ((frames as u128 * NANOS_PER_SECOND as u128) / self.rate as u128) as u64
    }

    /// Whole-frame byte count for a chunk of `duration_ns`, never less than one frame.
    pub fn chunk_bytes(&self, duration_ns: u64) -> usize {
        (self.time_to_bytes_floor(duration_ns) as usize).max(self.frame_bytes())
    }
}
