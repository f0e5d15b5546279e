//! hound-backed upstream for the decode read mode.

use crate::{Error, Result};
use hound::{SampleFormat as WavSampleFormat, WavReader, WavSpec};
use showcue_core::{AudioFormat, PullSource, SampleFormat};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Map a WAV header onto the engine's byte layout.
pub fn format_from_spec(spec: WavSpec) -> Result<AudioFormat> {
    let sample_format = match (spec.sample_format, spec.bits_per_sample) {
        (WavSampleFormat::Int, 8) => SampleFormat::U8,
        (WavSampleFormat::Int, 16) => SampleFormat::S16LE,
        (WavSampleFormat::Int, 24) => SampleFormat::S24LE,
        (WavSampleFormat::Int, 32) => SampleFormat::S32LE,
        (WavSampleFormat::Float, 32) => SampleFormat::F32LE,
        (format, bits) => {
            return Err(Error::UnsupportedFormat(format!("{format:?} {bits}-bit")));
        }
    };
    let format = AudioFormat::new(sample_format, spec.channels, spec.sample_rate);
    format.validate()?;
    Ok(format)
}

/// Open a WAV file just far enough to learn its format.
///
/// Missing files and malformed headers fail here, at load time, so a broken
/// sound is disabled before any voice is built for it.
pub fn probe_format(path: impl AsRef<Path>) -> Result<AudioFormat> {
    let reader = WavReader::open(path)?;
    format_from_spec(reader.spec())
}

/// Decodes a WAV file with hound and serves the samples as raw bytes.
pub struct WavFileSource {
    reader: WavReader<BufReader<File>>,
    format: AudioFormat,
    position: u64,
}

impl WavFileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let reader = WavReader::open(path)?;
        let format = format_from_spec(reader.spec())?;
        Ok(Self {
            reader,
            format,
            position: 0,
        })
    }

    fn read_into(
        &mut self,
        samples: usize,
        out: &mut Vec<u8>,
    ) -> std::result::Result<(), hound::Error> {
        let sample_format = self.format.sample_format;
        match sample_format {
            SampleFormat::F32LE => {
                for sample in self.reader.samples::<f32>().take(samples) {
                    out.extend_from_slice(&sample?.to_le_bytes());
                }
            }
            SampleFormat::U8 => {
                for sample in self.reader.samples::<i32>().take(samples) {
                    out.push((sample? + 128) as u8);
                }
            }
            _ => {
                let width = sample_format.bytes();
                for sample in self.reader.samples::<i32>().take(samples) {
                    out.extend_from_slice(&sample?.to_le_bytes()[..width]);
                }
            }
        }
        Ok(())
    }
}

impl PullSource for WavFileSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn pull(&mut self, offset: u64, len: usize) -> showcue_core::Result<Option<Vec<u8>>> {
        let frame = self.format.frame_bytes() as u64;
        if offset != self.position {
            let target = u32::try_from(offset / frame)
                .map_err(|_| showcue_core::Error::Source(format!("offset {offset} out of range")))?;
            self.reader.seek(target)?;
            self.position = target as u64 * frame;
        }

        // Whole frames only, at least one.
        let frames = (len as u64 / frame).max(1) as usize;
        let mut out = Vec::with_capacity(frames * frame as usize);
        self.read_into(frames * self.format.channels as usize, &mut out)
            .map_err(|e| showcue_core::Error::Source(e.to_string()))?;

        out.truncate(out.len() - out.len() % frame as usize);
        if out.is_empty() {
            return Ok(None);
        }
        self.position += out.len() as u64;
        Ok(Some(out))
    }
}
