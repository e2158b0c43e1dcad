//! Book → narrated WAV.
//!
//! A run moves through the [`Stage`]s in order and never goes back:
//!
//! ```text
//! Init → TextExtracted → LinesNormalized → ClipsSynthesized
//!      → TrackAssembled → Written → CleanedUp
//! ```
//!
//! Conversion happens before the clip directory exists, so a book that cannot
//! be read leaves nothing behind.  Once the directory exists it is removed on
//! every exit path, success or error.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::{
    audio::{write_wav, AudioBuffer},
    clips::ClipStore,
    convert::DocumentConverter,
    engine::{QualityPreset, SpeechEngine},
    error::{NarrateError, Result, SynthesisError},
    text::{normalize, LineFilter, TextLine},
    voice::ReferenceVoice,
};

/// Prefix of the in-progress output file.
const PARTIAL_PREFIX: &str = ".thamus_partial_";

// ─────────────────────────────────────────────────────────────────────────────
// Stages and policy
// ─────────────────────────────────────────────────────────────────────────────

/// Position of a run in its linear life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    TextExtracted,
    LinesNormalized,
    ClipsSynthesized,
    TrackAssembled,
    Written,
    CleanedUp,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::TextExtracted => "text-extracted",
            Self::LinesNormalized => "lines-normalized",
            Self::ClipsSynthesized => "clips-synthesized",
            Self::TrackAssembled => "track-assembled",
            Self::Written => "written",
            Self::CleanedUp => "cleaned-up",
        };
        f.write_str(name)
    }
}

/// What to do when the engine fails on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum FailurePolicy {
    /// Stop the run at the first failure.
    #[default]
    Abort,
    /// Leave the line out of the narration and carry on.
    Skip,
    /// Try the line once more, then stop the run if it fails again.
    #[cfg_attr(feature = "cli", value(name = "retry"))]
    RetryOnce,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Lines after normalisation.
    pub lines: usize,
    /// Lines sent to the engine.
    pub accepted: usize,
    /// Lines with nothing to say.
    pub skipped: usize,
    /// Lines left out after an engine failure (only under [`FailurePolicy::Skip`]).
    pub failed: Vec<usize>,
    /// Sample count of every clip in the output, in playback order.
    pub segments: Vec<usize>,
    pub sample_rate: u32,
    pub output: PathBuf,
}

impl RunSummary {
    pub fn duration_secs(&self) -> f32 {
        self.segments.iter().sum::<usize>() as f32 / self.sample_rate as f32
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Drives conversion, synthesis and assembly for one book at a time.
pub struct Pipeline<C, E> {
    converter: C,
    engine: E,
    voice: ReferenceVoice,
    preset: QualityPreset,
    policy: FailurePolicy,
    temp_root: Option<PathBuf>,
    show_progress: bool,
    stage: Stage,
}

impl<C: DocumentConverter, E: SpeechEngine> Pipeline<C, E> {
    pub fn new(converter: C, engine: E, voice: ReferenceVoice) -> Self {
        Self {
            converter,
            engine,
            voice,
            preset: QualityPreset::default(),
            policy: FailurePolicy::default(),
            temp_root: None,
            show_progress: false,
            stage: Stage::Init,
        }
    }

    pub fn with_preset(mut self, preset: QualityPreset) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create the clip directory under `root` rather than the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Draw a progress bar on stderr while synthesizing.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Stage reached by the most recent run.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "stage");
        self.stage = next;
    }

    /// Narrate `book` into a WAV file at `output`.
    pub fn run(&mut self, book: &Path, output: &Path) -> Result<RunSummary> {
        self.stage = Stage::Init;

        let text = self.converter.convert(book)?;
        self.advance(Stage::TextExtracted);

        let lines = normalize(&text);
        self.advance(Stage::LinesNormalized);

        let mut store = match &self.temp_root {
            Some(root) => ClipStore::create_in(root, lines.len())?,
            None => ClipStore::create(lines.len())?,
        };
        info!(path = %store.path().display(), "temporary directory created");

        let result = self.narrate(&lines, &mut store, output);

        let cleanup = store.close();
        self.advance(Stage::CleanedUp);
        match (result, cleanup) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                warn!(error = %cleanup_err, "could not remove clip directory");
                Err(e)
            }
        }
    }

    fn narrate(&mut self, lines: &[TextLine], store: &mut ClipStore, output: &Path) -> Result<RunSummary> {
        info!(lines = lines.len(), "generating audio for each line");
        let progress = self.progress_bar(lines.len());
        let mut filter = LineFilter::new();
        let mut failed = Vec::new();

        for line in lines {
            if filter.accept(line) {
                info!(line = line.index, text = %line.content, "generating audio");
                match self.synthesize_line(line) {
                    Ok(buffers) => {
                        store.write_line(line.index, buffers)?;
                    }
                    Err(source) if self.policy == FailurePolicy::Skip => {
                        warn!(line = line.index, error = %source, "synthesis failed; leaving line out");
                        failed.push(line.index);
                    }
                    Err(source) => {
                        progress.abandon();
                        return Err(NarrateError::Synthesis { line: line.index, source });
                    }
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();
        self.advance(Stage::ClipsSynthesized);

        info!(clips = store.written(), "combining audio clips");
        let track = store.assemble()?;
        self.advance(Stage::TrackAssembled);

        let segments = track.segments().to_vec();
        let audio = track.into_buffer();
        persist_wav(&audio, output)?;
        self.advance(Stage::Written);
        info!(
            path = %output.display(),
            samples = audio.samples.len(),
            secs = audio.duration_secs(),
            "saved narration"
        );

        Ok(RunSummary {
            lines: lines.len(),
            accepted: filter.accepted(),
            skipped: filter.rejected(),
            failed,
            segments,
            sample_rate: audio.sample_rate,
            output: output.to_path_buf(),
        })
    }

    fn synthesize_line(&mut self, line: &TextLine) -> Result<Vec<AudioBuffer>, SynthesisError> {
        let attempts = if self.policy == FailurePolicy::RetryOnce { 2 } else { 1 };
        let mut attempt = 1;
        loop {
            let result = self
                .engine
                .synthesize(&line.content, self.preset, &self.voice)
                .and_then(|buffers| {
                    if buffers.is_empty() {
                        Err(SynthesisError::NoAudio)
                    } else {
                        Ok(buffers)
                    }
                });
            match result {
                Err(e) if attempt < attempts => {
                    warn!(line = line.index, error = %e, "synthesis failed; retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} lines ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

/// Write `audio` beside `output`, then rename it into place.
///
/// A failed write leaves nothing at `output`.
fn persist_wav(audio: &AudioBuffer, output: &Path) -> Result<()> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let partial = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(".wav")
        .tempfile_in(dir)
        .map_err(|e| NarrateError::io(dir, e))?;
    write_wav(audio, partial.path())?;
    partial.persist(output).map_err(|e| NarrateError::io(output, e.error))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;

    struct Text(&'static str);

    impl DocumentConverter for Text {
        fn convert(&self, _path: &Path) -> Result<String, ConversionError> {
            Ok(self.0.to_string())
        }
    }

    /// Fails the first `failures` calls, then returns one short buffer.
    struct Flaky {
        failures: usize,
        calls: usize,
    }

    impl SpeechEngine for Flaky {
        fn synthesize(
            &mut self,
            _text: &str,
            _preset: QualityPreset,
            _voice: &ReferenceVoice,
        ) -> Result<Vec<AudioBuffer>, SynthesisError> {
            self.calls += 1;
            if self.calls <= self.failures {
                Err(SynthesisError::Engine("out of memory".into()))
            } else {
                Ok(vec![AudioBuffer::new(vec![0.1; 100], 24_000)])
            }
        }
    }

    fn voice() -> ReferenceVoice {
        ReferenceVoice::from_clips("/voices/test", Vec::new())
    }

    #[test]
    fn test_retry_once_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("book.wav");
        let mut p = Pipeline::new(Text("Hello"), Flaky { failures: 1, calls: 0 }, voice())
            .with_policy(FailurePolicy::RetryOnce)
            .with_temp_root(dir.path());
        let summary = p.run(Path::new("book.txt"), &out).unwrap();
        assert_eq!(p.engine().calls, 2);
        assert_eq!(summary.segments, vec![100]);
        assert_eq!(p.stage(), Stage::CleanedUp);
    }

    #[test]
    fn test_retry_once_gives_up_after_second_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = Pipeline::new(Text("Hello"), Flaky { failures: 2, calls: 0 }, voice())
            .with_policy(FailurePolicy::RetryOnce)
            .with_temp_root(dir.path());
        let err = p.run(Path::new("book.txt"), &dir.path().join("book.wav")).unwrap_err();
        assert!(matches!(err, NarrateError::Synthesis { line: 0, .. }), "got: {err}");
        assert_eq!(p.engine().calls, 2);
    }

    #[test]
    fn test_abort_does_not_retry() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = Pipeline::new(Text("Hello"), Flaky { failures: 1, calls: 0 }, voice())
            .with_temp_root(dir.path());
        assert!(p.run(Path::new("book.txt"), &dir.path().join("book.wav")).is_err());
        assert_eq!(p.engine().calls, 1);
        assert_eq!(p.stage(), Stage::CleanedUp);
    }

    #[test]
    fn test_skip_leaves_failed_line_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = Pipeline::new(Text("One\nTwo\nThree\n"), Flaky { failures: 1, calls: 0 }, voice())
            .with_policy(FailurePolicy::Skip)
            .with_temp_root(dir.path());
        let summary = p.run(Path::new("book.txt"), &dir.path().join("book.wav")).unwrap();
        assert_eq!(summary.failed, vec![0]);
        assert_eq!(summary.segments.len(), 2);
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir(&scratch).unwrap();
        // A directory cannot be replaced by the finished file.
        let out = dir.path().join("book.wav");
        std::fs::create_dir(&out).unwrap();

        let mut p = Pipeline::new(Text("Hello"), Flaky { failures: 0, calls: 0 }, voice())
            .with_temp_root(&scratch);
        let err = p.run(Path::new("book.txt"), &out).unwrap_err();
        assert!(matches!(err, NarrateError::Io { .. }), "got: {err}");
        assert_eq!(p.stage(), Stage::CleanedUp);

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["book.wav", "scratch"]);
        assert!(out.is_dir());
    }

    #[test]
    fn test_output_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("book.wav");
        std::fs::write(&out, b"stale").unwrap();
        let mut p = Pipeline::new(Text("Hello"), Flaky { failures: 0, calls: 0 }, voice())
            .with_temp_root(dir.path());
        p.run(Path::new("book.txt"), &out).unwrap();
        assert_eq!(crate::audio::read_wav(&out).unwrap().samples.len(), 100);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Init < Stage::TextExtracted);
        assert!(Stage::Written < Stage::CleanedUp);
        assert_eq!(Stage::LinesNormalized.to_string(), "lines-normalized");
    }
}
