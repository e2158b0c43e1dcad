//! Temporary clip storage and track assembly.
//!
//! Every synthesized buffer is written to its own WAV file inside a
//! run-scoped temporary directory.  File names encode `(line, segment)` with
//! fixed-width zero padding, so sorting the names sorts the clips into
//! playback order.  The directory is removed when the [`ClipStore`] is
//! dropped or closed.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::{
    audio::{read_wav, write_wav, AudioBuffer, Track},
    error::{NarrateError, Result},
};

/// Prefix of the run's temporary directory.
pub const CLIP_DIR_PREFIX: &str = "thamus_clips_";

/// Minimum digits used for the line index in clip names.
const MIN_LINE_WIDTH: usize = 6;

/// Digits used for the segment index in clip names.
const SEGMENT_WIDTH: usize = 4;

/// Segments a single line may produce.
pub const MAX_SEGMENTS: usize = 10_usize.pow(SEGMENT_WIDTH as u32);

// ─────────────────────────────────────────────────────────────────────────────
// Naming
// ─────────────────────────────────────────────────────────────────────────────

/// One synthesized buffer tagged with its position in the book.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedClip {
    pub line_index: usize,
    pub sub_index: usize,
    pub audio: AudioBuffer,
}

/// Zero-padded `(line, segment)` file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipName {
    line_width: usize,
}

impl ClipName {
    /// Naming wide enough for `line_count` lines.
    pub fn for_line_count(line_count: usize) -> Self {
        let digits = line_count.max(1).to_string().len();
        Self { line_width: digits.max(MIN_LINE_WIDTH) }
    }

    /// File stem for a clip, e.g. `clip_000012_0001`.
    pub fn stem(&self, line_index: usize, sub_index: usize) -> String {
        format!(
            "clip_{line_index:0lw$}_{sub_index:0sw$}",
            lw = self.line_width,
            sw = SEGMENT_WIDTH
        )
    }

    pub fn file_name(&self, line_index: usize, sub_index: usize) -> String {
        format!("{}.wav", self.stem(line_index, sub_index))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ClipStore
// ─────────────────────────────────────────────────────────────────────────────

/// Run-scoped directory of synthesized clips.
#[derive(Debug)]
pub struct ClipStore {
    dir: TempDir,
    naming: ClipName,
    written: usize,
}

impl ClipStore {
    /// Create a store in the system temporary directory.
    pub fn create(line_count: usize) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(CLIP_DIR_PREFIX)
            .tempdir()
            .map_err(|e| NarrateError::io(std::env::temp_dir(), e))?;
        Ok(Self::with_dir(dir, line_count))
    }

    /// Create a store under `root` instead of the system temporary directory.
    pub fn create_in(root: &Path, line_count: usize) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(CLIP_DIR_PREFIX)
            .tempdir_in(root)
            .map_err(|e| NarrateError::io(root, e))?;
        Ok(Self::with_dir(dir, line_count))
    }

    fn with_dir(dir: TempDir, line_count: usize) -> Self {
        debug!(path = %dir.path().display(), "created clip directory");
        Self { dir, naming: ClipName::for_line_count(line_count), written: 0 }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Number of clip files written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Persist one clip.
    pub fn write(&mut self, clip: &SynthesizedClip) -> Result<PathBuf> {
        if clip.sub_index >= MAX_SEGMENTS {
            return Err(NarrateError::TooManySegments { line: clip.line_index, max: MAX_SEGMENTS });
        }
        let path = self.dir.path().join(self.naming.file_name(clip.line_index, clip.sub_index));
        write_wav(&clip.audio, &path)?;
        self.written += 1;
        Ok(path)
    }

    /// Persist every buffer produced for `line_index`, numbering them in order.
    pub fn write_line(&mut self, line_index: usize, buffers: Vec<AudioBuffer>) -> Result<Vec<PathBuf>> {
        if buffers.len() > MAX_SEGMENTS {
            return Err(NarrateError::TooManySegments { line: line_index, max: MAX_SEGMENTS });
        }
        buffers
            .into_iter()
            .enumerate()
            .map(|(sub_index, audio)| self.write(&SynthesizedClip { line_index, sub_index, audio }))
            .collect()
    }

    /// Clip files currently in the store, sorted by stem.
    pub fn clip_paths(&self) -> Result<Vec<PathBuf>> {
        let dir = self.dir.path();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| NarrateError::io(dir, e))? {
            let path = entry.map_err(|e| NarrateError::io(dir, e))?.path();
            if path.extension().is_some_and(|e| e == "wav") {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_stem().cmp(&b.file_stem()));
        Ok(paths)
    }

    /// Decode all clips in stem order and join them into one track.
    pub fn assemble(&self) -> Result<Track> {
        let paths = self.clip_paths()?;
        if paths.is_empty() {
            return Err(NarrateError::EmptyOutput);
        }
        let mut track = Track::new();
        for path in &paths {
            track.append(read_wav(path)?)?;
        }
        debug!(clips = paths.len(), "assembled track");
        Ok(track)
    }

    /// Delete the directory, reporting any failure.
    ///
    /// Dropping the store also deletes it, silently.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| NarrateError::io(path, e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(value: f32, len: usize) -> AudioBuffer {
        AudioBuffer::new(vec![value; len], 24_000)
    }

    #[test]
    fn test_names_sort_numerically() {
        let naming = ClipName::for_line_count(150);
        let mut names: Vec<String> = [(100, 0), (2, 1), (2, 0), (10, 0), (9, 12), (9, 2)]
            .iter()
            .map(|&(l, s)| naming.stem(l, s))
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "clip_000002_0000",
                "clip_000002_0001",
                "clip_000009_0002",
                "clip_000009_0012",
                "clip_000010_0000",
                "clip_000100_0000",
            ]
        );
    }

    #[test]
    fn test_width_grows_with_line_count() {
        let naming = ClipName::for_line_count(12_345_678);
        assert_eq!(naming.stem(5, 0), "clip_00000005_0000");
    }

    #[test]
    fn test_assemble_orders_by_line_then_segment() {
        let mut store = ClipStore::create(20).unwrap();
        store.write_line(11, vec![buf(0.5, 3)]).unwrap();
        store.write_line(2, vec![buf(0.1, 2), buf(0.2, 4)]).unwrap();
        store.write_line(3, vec![buf(0.3, 1)]).unwrap();
        assert_eq!(store.written(), 4);

        let track = store.assemble().unwrap();
        assert_eq!(track.segments(), &[2, 4, 1, 3]);
        store.close().unwrap();
    }

    #[test]
    fn test_assemble_empty_is_error() {
        let store = ClipStore::create(0).unwrap();
        assert!(matches!(store.assemble(), Err(NarrateError::EmptyOutput)));
    }

    #[test]
    fn test_directory_removed_on_drop_and_close() {
        let store = ClipStore::create(1).unwrap();
        let path = store.path().to_path_buf();
        assert!(path.is_dir());
        drop(store);
        assert!(!path.exists());

        let mut store = ClipStore::create(1).unwrap();
        store.write_line(0, vec![buf(0.1, 10)]).unwrap();
        let path = store.path().to_path_buf();
        store.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_create_in_uses_root_and_prefix() {
        let root = tempfile::tempdir().unwrap();
        let store = ClipStore::create_in(root.path(), 3).unwrap();
        assert!(store.path().starts_with(root.path()));
        let name = store.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(CLIP_DIR_PREFIX), "got: {name}");
    }
}
