//! Minimal RIFF/WAVE walker for the direct-read path.
//!
//! Only the payload of `data` sub-chunks is handed out; `fmt ` is parsed for
//! validation and every other chunk (`LIST`, `fact`, `cue `, ...) is skipped,
//! honouring the pad byte after odd-sized chunks.

use crate::{Error, Result};
use showcue_core::{AudioFormat, SampleFormat};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

pub struct RiffReader<R> {
    reader: R,
    format: Option<AudioFormat>,
    /// Unread payload bytes of the current `data` chunk.
    remaining: u64,
    pad: bool,
    done: bool,
}

impl RiffReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read> RiffReader<R> {
    /// Check the `RIFF....WAVE` preamble.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut header = [0u8; 12];
        reader.read_exact(&mut header).map_err(truncated)?;
        if &header[0..4] != b"RIFF" {
            return Err(Error::NotRiff);
        }
        if &header[8..12] != b"WAVE" {
            return Err(Error::NotWave);
        }
        Ok(Self {
            reader,
            format: None,
            remaining: 0,
            pad: false,
            done: false,
        })
    }

    /// Format from the most recent `fmt ` chunk, once one has been seen.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Copy `data` payload into `buf`. Returns 0 at end of file.
    ///
    /// A file that ends in the middle of a `data` chunk simply ends early.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.remaining > 0 {
                let want = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
                let n = self.reader.read(&mut buf[..want])?;
                if n == 0 {
                    tracing::debug!("RIFF data ended {} bytes short", self.remaining);
                    self.done = true;
                    self.remaining = 0;
                    return Ok(0);
                }
                self.remaining -= n as u64;
                if self.remaining == 0 && self.pad {
                    self.skip(1)?;
                }
                return Ok(n);
            }
            if self.done {
                return Ok(0);
            }

            let mut header = [0u8; 8];
            match self.reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.done = true;
                    return Ok(0);
                }
                Err(e) => return Err(e.into()),
            }
            let id = [header[0], header[1], header[2], header[3]];
            let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as u64;

            match &id {
                b"fmt " => {
                    let mut body = vec![0u8; size as usize];
                    self.reader.read_exact(&mut body).map_err(truncated)?;
                    if size % 2 == 1 {
                        self.skip(1)?;
                    }
                    self.format = Some(parse_fmt(&body)?);
                }
                b"data" => {
                    if self.format.is_none() {
                        return Err(Error::MissingFormat);
                    }
                    self.remaining = size;
                    self.pad = size % 2 == 1;
                    if size == 0 {
                        continue;
                    }
                }
                other => {
                    tracing::trace!(
                        "Skipping RIFF chunk {:?} ({} bytes)",
                        String::from_utf8_lossy(other),
                        size
                    );
                    self.skip(size + size % 2)?;
                }
            }
        }
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        let skipped = io::copy(&mut self.reader.by_ref().take(n), &mut io::sink())?;
        if skipped < n {
            self.done = true;
        }
        Ok(())
    }
}

fn truncated(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated
    } else {
        Error::Io(err)
    }
}

/// Decode a `fmt ` chunk body.
pub fn parse_fmt(body: &[u8]) -> Result<AudioFormat> {
    if body.len() < 16 {
        return Err(Error::Truncated);
    }
    let le16 = |at: usize| u16::from_le_bytes([body[at], body[at + 1]]);
    let mut tag = le16(0);
    let channels = le16(2);
    let rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
    let bits = le16(14);

    if tag == WAVE_FORMAT_EXTENSIBLE {
        // cbSize(2) validBits(2) channelMask(4) then the sub-format GUID.
        if body.len() < 26 {
            return Err(Error::Truncated);
        }
        tag = le16(24);
    }

    let sample_format = match (tag, bits) {
        (WAVE_FORMAT_PCM, 8) => SampleFormat::U8,
        (WAVE_FORMAT_PCM, 16) => SampleFormat::S16LE,
        (WAVE_FORMAT_PCM, 24) => SampleFormat::S24LE,
        (WAVE_FORMAT_PCM, 32) => SampleFormat::S32LE,
        (WAVE_FORMAT_IEEE_FLOAT, 32) => SampleFormat::F32LE,
        (WAVE_FORMAT_IEEE_FLOAT, 64) => SampleFormat::F64LE,
        _ => {
            return Err(Error::UnsupportedFormat(format!(
                "format tag {tag:#06x} with {bits} bits"
            )))
        }
    };
    let format = AudioFormat::new(sample_format, channels, rate);
    format.validate()?;
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn fmt_pcm16_stereo() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        body.extend_from_slice(&2u16.to_le_bytes());
        body.extend_from_slice(&48000u32.to_le_bytes());
        body.extend_from_slice(&(48000u32 * 4).to_le_bytes());
        body.extend_from_slice(&4u16.to_le_bytes());
        body.extend_from_slice(&16u16.to_le_bytes());
        chunk(b"fmt ", &body)
    }

    fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(&body);
        out
    }

    fn read_all<R: Read>(reader: &mut RiffReader<R>, step: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; step];
        loop {
            let n = reader.read_data(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    // =========================================================================
    // Chunk walking
    // =========================================================================

    #[test]
    fn test_only_data_payload_is_copied() {
        let payload: Vec<u8> = (0..64u8).collect();
        let file = riff(&[
            chunk(b"LIST", b"INFOISFT\x03\x00\x00\x00ab\x00"),
            fmt_pcm16_stereo(),
            chunk(b"data", &payload),
            chunk(b"LIST", b"odd"),
        ]);
        let mut reader = RiffReader::new(Cursor::new(file)).unwrap();
        assert_eq!(read_all(&mut reader, 7), payload);
        assert_eq!(
            reader.format(),
            Some(AudioFormat::new(SampleFormat::S16LE, 2, 48000))
        );
    }

    #[test]
    fn test_multiple_data_chunks_concatenate() {
        let file = riff(&[
            fmt_pcm16_stereo(),
            chunk(b"data", &[1, 2, 3]),
            chunk(b"cue ", &[9; 5]),
            chunk(b"data", &[4, 5, 6, 7]),
        ]);
        let mut reader = RiffReader::new(Cursor::new(file)).unwrap();
        assert_eq!(read_all(&mut reader, 4096), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_truncated_data_ends_early() {
        let mut file = riff(&[fmt_pcm16_stereo(), chunk(b"data", &[7; 16])]);
        file.truncate(file.len() - 6);
        let mut reader = RiffReader::new(Cursor::new(file)).unwrap();
        assert_eq!(read_all(&mut reader, 4), vec![7; 10]);
    }

    // =========================================================================
    // Rejections
    // =========================================================================

    #[test]
    fn test_rejects_non_riff() {
        let result = RiffReader::new(Cursor::new(b"OggS\0\0\0\0WAVE".to_vec()));
        assert!(matches!(result, Err(Error::NotRiff)));
    }

    #[test]
    fn test_rejects_non_wave_form() {
        let mut file = riff(&[]);
        file[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(
            RiffReader::new(Cursor::new(file)),
            Err(Error::NotWave)
        ));
    }

    #[test]
    fn test_data_before_fmt() {
        let file = riff(&[chunk(b"data", &[0; 4])]);
        let mut reader = RiffReader::new(Cursor::new(file)).unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            reader.read_data(&mut buf),
            Err(Error::MissingFormat)
        ));
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            RiffReader::new(Cursor::new(b"RIFF".to_vec())),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn test_float_and_extensible_formats() {
        let mut body = Vec::new();
        body.extend_from_slice(&WAVE_FORMAT_IEEE_FLOAT.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&96000u32.to_le_bytes());
        body.extend_from_slice(&(96000u32 * 8).to_le_bytes());
        body.extend_from_slice(&8u16.to_le_bytes());
        body.extend_from_slice(&64u16.to_le_bytes());
        assert_eq!(parse_fmt(&body).unwrap().sample_format, SampleFormat::F64LE);

        let mut ext = body.clone();
        ext[0..2].copy_from_slice(&WAVE_FORMAT_EXTENSIBLE.to_le_bytes());
        ext.extend_from_slice(&22u16.to_le_bytes());
        ext.extend_from_slice(&64u16.to_le_bytes());
        ext.extend_from_slice(&4u32.to_le_bytes());
        ext.extend_from_slice(&WAVE_FORMAT_IEEE_FLOAT.to_le_bytes());
        ext.extend_from_slice(&[0u8; 14]);
        assert_eq!(parse_fmt(&ext).unwrap().sample_format, SampleFormat::F64LE);
    }
}
