//! Reference voice — the sample clips the engine clones a speaker from.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    audio::{read_wav, AudioBuffer},
    error::{NarrateError, Result},
};

/// Rate every reference clip is converted to before synthesis.
pub const REFERENCE_SAMPLE_RATE: u32 = 22_050;

/// One decoded reference clip.
#[derive(Debug, Clone)]
pub struct ReferenceClip {
    pub name: String,
    pub audio: AudioBuffer,
}

/// The set of reference clips for one speaker, loaded once per run.
#[derive(Debug, Clone)]
pub struct ReferenceVoice {
    directory: PathBuf,
    clips: Vec<ReferenceClip>,
}

impl ReferenceVoice {
    /// Load every `.wav` file in `directory`, in file-name order.
    ///
    /// Clips are downmixed to mono and converted to [`REFERENCE_SAMPLE_RATE`].
    /// Other files are skipped with a warning.  A directory without any WAV
    /// clip is an error.
    pub fn load(directory: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(directory).map_err(|e| NarrateError::io(directory, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| NarrateError::io(directory, e))?.path();
            if !path.is_file() {
                continue;
            }
            if is_wav(&path) {
                paths.push(path);
            } else {
                warn!(path = %path.display(), "ignoring non-WAV file in voice directory");
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(NarrateError::Voice(format!(
                "no WAV clips in {}",
                directory.display()
            )));
        }

        let clips = paths
            .iter()
            .map(|path| {
                let audio = read_wav(path)?.into_rate(REFERENCE_SAMPLE_RATE)?;
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                debug!(clip = %name, secs = audio.duration_secs(), "loaded reference clip");
                Ok(ReferenceClip { name, audio })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { directory: directory.to_path_buf(), clips })
    }

    /// Build a voice from clips already in memory.
    pub fn from_clips(directory: impl Into<PathBuf>, clips: Vec<ReferenceClip>) -> Self {
        Self { directory: directory.into(), clips }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn clips(&self) -> &[ReferenceClip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;

    #[test]
    fn test_load_sorts_and_resamples() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&AudioBuffer::new(vec![0.1; 24_000], 24_000), &dir.path().join("b.wav")).unwrap();
        write_wav(&AudioBuffer::new(vec![0.1; 22_050], 22_050), &dir.path().join("a.WAV")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not audio").unwrap();

        let voice = ReferenceVoice::load(dir.path()).unwrap();
        assert_eq!(voice.len(), 2);
        assert_eq!(voice.clips()[0].name, "a");
        assert_eq!(voice.clips()[1].name, "b");
        for clip in voice.clips() {
            assert_eq!(clip.audio.sample_rate, REFERENCE_SAMPLE_RATE);
            assert_eq!(clip.audio.samples.len(), 22_050);
        }
    }

    #[test]
    fn test_load_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReferenceVoice::load(dir.path()).unwrap_err();
        assert!(matches!(err, NarrateError::Voice(_)), "got: {err}");
    }
}
