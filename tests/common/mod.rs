//! Shared helpers for pipeline integration tests.
//!
//! The converter and engine are in-memory stand-ins, so the suite needs
//! neither pandoc nor a voice model.

use std::path::Path;

use thamus::{
    AudioBuffer, ConversionError, DocumentConverter, QualityPreset, ReferenceVoice, SpeechEngine,
    SynthesisError,
};

pub const RATE: u32 = 24_000;

/// Returns fixed text, or fails as if the document were unreadable.
pub struct FixedText(pub Option<String>);

impl FixedText {
    pub fn of(text: impl Into<String>) -> Self {
        Self(Some(text.into()))
    }

    pub fn unreadable() -> Self {
        Self(None)
    }
}

impl DocumentConverter for FixedText {
    fn convert(&self, path: &Path) -> Result<String, ConversionError> {
        match &self.0 {
            Some(text) => Ok(text.clone()),
            None => Err(ConversionError::NotUtf8 { path: path.to_path_buf() }),
        }
    }
}

/// Records every line it is asked to speak.
///
/// Call `n` (1-based) yields `segments` buffers of `clip_len` samples each,
/// filled with [`level`]`(n)`.  `fail_on` makes that call fail instead.
pub struct RecordingEngine {
    pub spoken: Vec<String>,
    pub segments: usize,
    pub clip_len: usize,
    pub fail_on: Option<usize>,
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self { spoken: Vec::new(), segments: 1, clip_len: 240, fail_on: None }
    }
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Distinct, 16-bit-representable amplitude for call `n`.
pub fn level(n: usize) -> f32 {
    ((n % 90) + 1) as f32 / 100.0
}

impl SpeechEngine for RecordingEngine {
    fn synthesize(
        &mut self,
        text: &str,
        _preset: QualityPreset,
        _voice: &ReferenceVoice,
    ) -> Result<Vec<AudioBuffer>, SynthesisError> {
        self.spoken.push(text.to_string());
        let n = self.spoken.len();
        if self.fail_on == Some(n) {
            return Err(SynthesisError::Engine("CUDA out of memory".into()));
        }
        Ok((0..self.segments)
            .map(|_| AudioBuffer::new(vec![level(n); self.clip_len], RATE))
            .collect())
    }
}

pub fn voice() -> ReferenceVoice {
    ReferenceVoice::from_clips("/voices/test", Vec::new())
}

/// Number of entries directly under `dir`.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Mean amplitude of each consecutive `len`-sample block.
pub fn block_levels(samples: &[f32], len: usize) -> Vec<f32> {
    samples
        .chunks(len)
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}
