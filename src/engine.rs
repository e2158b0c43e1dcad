//! Speech engine seam.
//!
//! The voice-cloning model lives outside this crate.  [`SpeechEngine`] is the
//! narrow contract the pipeline drives; [`CommandEngine`] satisfies it by
//! running an external synthesis program once per line.
//!
//! Engine options ([`EngineConfig`]) are fixed when the engine is built and
//! never change between lines.

use std::{
    fmt,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::Context;
use serde::Deserialize;
use tempfile::TempDir;
use tracing::debug;

use crate::{
    audio::{read_wav, write_wav, AudioBuffer, ENGINE_SAMPLE_RATE},
    error::SynthesisError,
    voice::ReferenceVoice,
};

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Speed/quality trade-off passed to the engine for every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum QualityPreset {
    #[cfg_attr(feature = "cli", value(name = "ultra_fast"))]
    UltraFast,
    Fast,
    #[default]
    Standard,
    #[cfg_attr(feature = "cli", value(name = "high_quality"))]
    HighQuality,
}

impl QualityPreset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UltraFast => "ultra_fast",
            Self::Fast => "fast",
            Self::Standard => "standard",
            Self::HighQuality => "high_quality",
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric precision of model weights and activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Full,
    Half,
}

impl Precision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Half => "half",
        }
    }
}

/// Options resolved once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Reuse key/value state across generation steps.
    pub kv_cache: bool,
    /// Use the optional inference accelerator when the engine has one.
    pub accelerator: bool,
    pub precision: Precision,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { kv_cache: true, accelerator: true, precision: Precision::Full }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A voice-cloning text-to-speech engine.
///
/// Engines hold loaded model state and are driven from one thread, one line
/// at a time, hence `&mut self`.
pub trait SpeechEngine {
    /// Synthesize `text` in the voice of `voice`.
    ///
    /// Returns the generated audio as one or more buffers in playback order.
    /// An empty vector is treated as [`SynthesisError::NoAudio`] by callers.
    fn synthesize(
        &mut self,
        text: &str,
        preset: QualityPreset,
        voice: &ReferenceVoice,
    ) -> Result<Vec<AudioBuffer>, SynthesisError>;
}

impl<E: SpeechEngine + ?Sized> SpeechEngine for Box<E> {
    fn synthesize(
        &mut self,
        text: &str,
        preset: QualityPreset,
        voice: &ReferenceVoice,
    ) -> Result<Vec<AudioBuffer>, SynthesisError> {
        (**self).synthesize(text, preset, voice)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// External command engine
// ─────────────────────────────────────────────────────────────────────────────

/// How to invoke an external synthesis program.
///
/// Each entry of `args` may contain placeholders that are substituted per
/// call:
///
/// | Placeholder     | Value                                        |
/// |-----------------|----------------------------------------------|
/// | `{text}`        | the line to speak                            |
/// | `{preset}`      | `ultra_fast`, `fast`, `standard`, `high_quality` |
/// | `{voice}`       | a directory of the reference clips, as mono 22050 Hz WAVs |
/// | `{output}`      | an empty directory for the generated WAVs    |
/// | `{kv_cache}`    | `true` / `false`                             |
/// | `{accelerator}` | `true` / `false`                             |
/// | `{precision}`   | `full` / `half`                              |
///
/// The program must write one or more WAV files into `{output}`; they are
/// read back in file-name order and converted to `output_rate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_output_rate")]
    pub output_rate: u32,
}

fn default_output_rate() -> u32 {
    ENGINE_SAMPLE_RATE
}

impl Default for CommandSpec {
    fn default() -> Self {
        let args = [
            "--text", "{text}",
            "--preset", "{preset}",
            "--voice-dir", "{voice}",
            "--output-dir", "{output}",
            "--kv-cache", "{kv_cache}",
            "--accelerator", "{accelerator}",
            "--precision", "{precision}",
        ];
        Self {
            program: "tortoise-tts".to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            output_rate: ENGINE_SAMPLE_RATE,
        }
    }
}

impl CommandSpec {
    /// Read a spec from a JSON file:
    /// `{"program": "...", "args": ["..."], "output_rate": 24000}`.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read engine config: {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse engine config: {}", path.display()))
    }
}

/// Reference clips written out for the external program.
#[derive(Debug)]
struct StagedVoice {
    source: PathBuf,
    dir: TempDir,
}

impl StagedVoice {
    fn write(voice: &ReferenceVoice) -> Result<Self, SynthesisError> {
        let dir = tempfile::Builder::new()
            .prefix("thamus_voice_")
            .tempdir()
            .map_err(output_err)?;
        for (i, clip) in voice.clips().iter().enumerate() {
            let path = dir.path().join(format!("{i:04}_{}.wav", clip.name));
            write_wav(&clip.audio, &path).map_err(output_err)?;
        }
        debug!(path = %dir.path().display(), clips = voice.len(), "staged reference clips");
        Ok(Self { source: voice.directory().to_path_buf(), dir })
    }
}

/// Runs a [`CommandSpec`] for every line.
///
/// The reference clips are written once, on the first call, and reused
/// until a different voice is passed in.
#[derive(Debug)]
pub struct CommandEngine {
    spec: CommandSpec,
    config: EngineConfig,
    staged: Option<StagedVoice>,
}

impl CommandEngine {
    pub fn new(spec: CommandSpec, config: EngineConfig) -> Self {
        Self { spec, config, staged: None }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    fn stage_voice(&mut self, voice: &ReferenceVoice) -> Result<PathBuf, SynthesisError> {
        let staged = match self.staged.take() {
            Some(staged) if staged.source == voice.directory() => staged,
            _ => StagedVoice::write(voice)?,
        };
        Ok(self.staged.insert(staged).dir.path().to_path_buf())
    }

    fn render_args(
        &self,
        text: &str,
        preset: QualityPreset,
        voice: &Path,
        output: &Path,
    ) -> Vec<String> {
        let voice = voice.to_string_lossy();
        let output = output.to_string_lossy();
        let kv_cache = self.config.kv_cache.to_string();
        let accelerator = self.config.accelerator.to_string();
        self.spec
            .args
            .iter()
            .map(|arg| {
                arg.replace("{preset}", preset.as_str())
                    .replace("{voice}", &voice)
                    .replace("{output}", &output)
                    .replace("{kv_cache}", &kv_cache)
                    .replace("{accelerator}", &accelerator)
                    .replace("{precision}", self.config.precision.as_str())
                    // Last, so text containing a placeholder is passed through verbatim.
                    .replace("{text}", text)
            })
            .collect()
    }
}

impl SpeechEngine for CommandEngine {
    fn synthesize(
        &mut self,
        text: &str,
        preset: QualityPreset,
        voice: &ReferenceVoice,
    ) -> Result<Vec<AudioBuffer>, SynthesisError> {
        let voice_dir = self.stage_voice(voice)?;
        let scratch = tempfile::Builder::new()
            .prefix("thamus_engine_")
            .tempdir()
            .map_err(output_err)?;

        let args = self.render_args(text, preset, &voice_dir, scratch.path());
        debug!(program = %self.spec.program, ?args, "running engine");

        let output = Command::new(&self.spec.program)
            .args(&args)
            .output()
            .map_err(|source| SynthesisError::Spawn { program: self.spec.program.clone(), source })?;

        if !output.status.success() {
            return Err(SynthesisError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let buffers = collect_wavs(scratch.path(), self.spec.output_rate)?;
        if buffers.is_empty() {
            return Err(SynthesisError::NoAudio);
        }
        Ok(buffers)
    }
}

fn output_err(e: impl fmt::Display) -> SynthesisError {
    SynthesisError::Output(e.to_string())
}

fn collect_wavs(dir: &Path, output_rate: u32) -> Result<Vec<AudioBuffer>, SynthesisError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(output_err)? {
        let path = entry.map_err(output_err)?.path();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("wav")) {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .iter()
        .map(|p| {
            read_wav(p)
                .and_then(|audio| audio.into_rate(output_rate))
                .map_err(output_err)
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
