//! # thamus
//!
//! Turn an ebook into a narrated audio file, spoken in a voice cloned from a
//! handful of reference clips.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use thamus::{CommandEngine, CommandSpec, EngineConfig, PandocConverter, Pipeline, ReferenceVoice};
//!
//! let voice = ReferenceVoice::load(Path::new("voices/narrator")).unwrap();
//! let engine = CommandEngine::new(CommandSpec::default(), EngineConfig::default());
//! let mut pipeline = Pipeline::new(PandocConverter::new(), engine, voice);
//!
//! let summary = pipeline
//!     .run(Path::new("moby-dick.epub"), Path::new("moby-dick.wav"))
//!     .unwrap();
//! println!("{} lines, {:.0} s of audio", summary.accepted, summary.duration_secs());
//! ```
//!
//! ## Pipeline
//! 1. **Conversion** — `pandoc` renders the book as unwrapped plain text.
//! 2. **Normalisation** — emphasis underscores become spaces, `---` rules
//!    become `Footnote:`, and the text is split into lines.
//! 3. **Filtering** — lines of pure punctuation are skipped.
//! 4. **Synthesis** — the engine speaks each remaining line, one at a time.
//! 5. **Clip storage** — every buffer goes to a zero-padded WAV file in a
//!    temporary directory.
//! 6. **Assembly** — clips are read back in name order and concatenated.
//! 7. **Output** — the track is written as 16-bit PCM WAV and the temporary
//!    directory is removed.

pub mod audio;
pub mod clips;
pub mod convert;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod text;
pub mod voice;

#[cfg(feature = "cli")]
pub mod cli;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use audio::{AudioBuffer, Track, ENGINE_SAMPLE_RATE};
pub use clips::{ClipName, ClipStore, SynthesizedClip};
pub use convert::{DocumentConverter, PandocConverter};
pub use engine::{CommandEngine, CommandSpec, EngineConfig, Precision, QualityPreset, SpeechEngine};
pub use error::{ConversionError, NarrateError, Result, SynthesisError};
pub use pipeline::{FailurePolicy, Pipeline, RunSummary, Stage};
pub use text::{normalize, LineFilter, TextLine};
pub use voice::{ReferenceVoice, REFERENCE_SAMPLE_RATE};
