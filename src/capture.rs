//! Capture blocks and the sources that fill them.
//!
//! The engine never opens a device. Once per frame a [`CaptureSource`] fills a
//! fixed-size block that every microphone generator reads from.

use std::fmt;
use std::io::Read;
use std::path::Path;

/// Samples in one captured block.
pub const CAPTURE_CAPACITY: usize = 4096;

/// One frame of captured samples, normalised to `[-1, 1]`.
pub type CaptureBlock = [f32; CAPTURE_CAPACITY];

/// A fresh zeroed block.
pub fn empty_block() -> Box<CaptureBlock> {
    Box::new([0.0; CAPTURE_CAPACITY])
}

/// Convert signed 16-bit PCM into floats, dividing by `i16::MAX`.
///
/// Converts `min(pcm.len(), out.len())` samples and returns that count.
pub fn pcm_to_float(pcm: &[i16], out: &mut [f32]) -> usize {
    let n = pcm.len().min(out.len());
    for (o, &s) in out.iter_mut().zip(pcm) {
        *o = s as f32 / i16::MAX as f32;
    }
    n
}

/// Errors raised by capture sources.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The WAV reader failed.
    Wav(String),
    /// The WAV sample format cannot be converted.
    UnsupportedFormat,
    /// The source holds no samples.
    Empty,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Wav(msg) => write!(f, "wav error: {}", msg),
            CaptureError::UnsupportedFormat => write!(f, "unsupported sample format"),
            CaptureError::Empty => write!(f, "capture source is empty"),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<hound::Error> for CaptureError {
    fn from(e: hound::Error) -> Self {
        CaptureError::Wav(e.to_string())
    }
}

/// Something that can hand over one block per frame.
pub trait CaptureSource {
    /// Overwrite `block` with the next frame of samples.
    fn fill(&mut self, block: &mut CaptureBlock) -> Result<(), CaptureError>;
}

/// A source that always yields silence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silence;

impl CaptureSource for Silence {
    fn fill(&mut self, block: &mut CaptureBlock) -> Result<(), CaptureError> {
        block.fill(0.0);
        Ok(())
    }
}

/// Capture backed by decoded WAV data; reads the first channel only.
#[derive(Debug, Clone)]
pub struct WavCapture {
    samples: Vec<f32>,
    cursor: usize,
    looping: bool,
}

impl WavCapture {
    /// Open a WAV file.
    pub fn open(path: impl AsRef<Path>, looping: bool) -> Result<Self, CaptureError> {
        let reader = hound::WavReader::open(path)?;
        Self::decode(reader, looping)
    }

    /// Decode WAV data from any reader.
    pub fn from_reader<R: Read>(reader: R, looping: bool) -> Result<Self, CaptureError> {
        let reader = hound::WavReader::new(reader)?;
        Self::decode(reader, looping)
    }

    fn decode<R: Read>(reader: hound::WavReader<R>, looping: bool) -> Result<Self, CaptureError> {
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => {
                let pcm = reader
                    .into_samples::<i16>()
                    .collect::<Result<Vec<_>, _>>()?;
                let mut out = vec![0.0; pcm.len()];
                pcm_to_float(&pcm, &mut out);
                out
            }
            (hound::SampleFormat::Int, bits) if (8..=32).contains(&bits) => {
                let scale = ((1i64 << (bits - 1)) - 1) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()?
            }
            (hound::SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(CaptureError::UnsupportedFormat),
        };
        let samples: Vec<f32> = interleaved.into_iter().step_by(channels).collect();
        if samples.is_empty() {
            return Err(CaptureError::Empty);
        }
        Ok(Self {
            samples,
            cursor: 0,
            looping,
        })
    }

    /// Number of decoded mono samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; empty files are rejected on decode.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl CaptureSource for WavCapture {
    fn fill(&mut self, block: &mut CaptureBlock) -> Result<(), CaptureError> {
        for slot in block.iter_mut() {
            if self.cursor >= self.samples.len() {
                if !self.looping {
                    *slot = 0.0;
                    continue;
                }
                self.cursor = 0;
            }
            *slot = self.samples[self.cursor];
            self.cursor += 1;
        }
        Ok(())
    }
}
