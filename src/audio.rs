//! Waveform buffers, WAV codec and concatenation.
//!
//! All audio inside the crate is mono `f32` in `[-1.0, 1.0]`.  Files on disk
//! are 16-bit PCM WAV, which every player (and `hound`) reads back exactly.

use std::path::Path;

use rubato::{FftFixedIn, Resampler};

use crate::error::{NarrateError, Result};

/// Sample rate of audio produced by the voice-cloning engine.
pub const ENGINE_SAMPLE_RATE: u32 = 24_000;

/// Input block size for the FFT resampler.
const RESAMPLE_CHUNK: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// AudioBuffer
// ─────────────────────────────────────────────────────────────────────────────

/// A mono waveform with its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Return this buffer at `sample_rate`, converting if needed.
    pub fn into_rate(self, sample_rate: u32) -> Result<Self> {
        if self.sample_rate == sample_rate {
            return Ok(self);
        }
        let samples = resample(&self.samples, self.sample_rate, sample_rate)?;
        Ok(Self { samples, sample_rate })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WAV codec
// ─────────────────────────────────────────────────────────────────────────────

/// Decode a WAV file to mono `f32`, averaging channels.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let mut reader = hound::WavReader::open(path).map_err(|e| NarrateError::wav(path, e))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| NarrateError::wav(path, e))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| NarrateError::wav(path, e))?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate))
}

/// Write `audio` as a mono 16-bit PCM WAV file.
pub fn write_wav(audio: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| NarrateError::wav(path, e))?;
    for &s in &audio.samples {
        // f32 [-1.0, 1.0] → i16 [-32768, 32767]
        let s16 = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s16).map_err(|e| NarrateError::wav(path, e))?;
    }
    writer.finalize().map_err(|e| NarrateError::wav(path, e))
}

// ─────────────────────────────────────────────────────────────────────────────
// Resampling
// ─────────────────────────────────────────────────────────────────────────────

fn resample_err(e: impl std::fmt::Display) -> NarrateError {
    NarrateError::Resample(e.to_string())
}

/// Convert mono `input` from `sr_in` to `sr_out` Hz.
///
/// The resampler's warm-up delay is discarded, so the output length is
/// `ceil(len * sr_out / sr_in)`.
pub fn resample(input: &[f32], sr_in: u32, sr_out: u32) -> Result<Vec<f32>> {
    if sr_in == sr_out || input.is_empty() {
        return Ok(input.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(sr_in as usize, sr_out as usize, RESAMPLE_CHUNK, 2, 1)
            .map_err(resample_err)?;

    let expected = (input.len() as u64 * sr_out as u64).div_ceil(sr_in as u64) as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let mut blocks = input.chunks_exact(RESAMPLE_CHUNK);
    for block in &mut blocks {
        let frames = resampler.process(&[block][..], None).map_err(resample_err)?;
        out.extend_from_slice(&frames[0]);
    }
    let rest = blocks.remainder();
    if !rest.is_empty() {
        let frames = resampler.process_partial(Some(&[rest][..]), None).map_err(resample_err)?;
        out.extend_from_slice(&frames[0]);
    }
    // Flush whatever the delay line still holds.
    while out.len() < expected + delay {
        let frames = resampler.process_partial::<&[f32]>(None, None).map_err(resample_err)?;
        if frames[0].is_empty() {
            break;
        }
        out.extend_from_slice(&frames[0]);
    }

    Ok(out.into_iter().skip(delay).take(expected).collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Track
// ─────────────────────────────────────────────────────────────────────────────

/// Audio built by appending clips end to end.
///
/// The rate of the first clip fixes the rate of the track; later clips at a
/// different rate are converted before they are appended.
#[derive(Debug, Clone, Default)]
pub struct Track {
    samples: Vec<f32>,
    sample_rate: Option<u32>,
    segments: Vec<usize>,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, clip: AudioBuffer) -> Result<()> {
        let rate = *self.sample_rate.get_or_insert(clip.sample_rate);
        let clip = clip.into_rate(rate)?;
        self.segments.push(clip.samples.len());
        self.samples.extend(clip.samples);
        Ok(())
    }

    /// Sample count of every appended clip, in order.
    pub fn segments(&self) -> &[usize] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(ENGINE_SAMPLE_RATE)
    }

    pub fn into_buffer(self) -> AudioBuffer {
        let sample_rate = self.sample_rate();
        AudioBuffer::new(self.samples, sample_rate)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
