//! Error taxonomy for a narration run.
//!
//! Every variant terminates the run.  The only non-error skip path is a line
//! made of punctuation alone, which never reaches this module.

use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = NarrateError> = std::result::Result<T, E>;

/// The document could not be turned into plain text.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("cannot launch converter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("converter failed on {path} ({status}): {stderr}")]
    Failed {
        path: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error("converter produced non-UTF-8 text for {path}")]
    NotUtf8 { path: PathBuf },
}

/// The speech engine could not produce audio for a line.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("cannot launch engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("engine exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("engine returned no audio")]
    NoAudio,

    #[error("cannot read engine output: {0}")]
    Output(String),

    #[error("{0}")]
    Engine(String),
}

/// Top-level error for a narration run.
#[derive(Debug, Error)]
pub enum NarrateError {
    #[error("could not read the book: {0}")]
    Conversion(#[from] ConversionError),

    #[error("synthesis failed on line {line}: {source}")]
    Synthesis {
        line: usize,
        #[source]
        source: SynthesisError,
    },

    #[error("no speakable lines; nothing to assemble")]
    EmptyOutput,

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("reference voice: {0}")]
    Voice(String),

    #[error("clip line {line} has more than {max} segments")]
    TooManySegments { line: usize, max: usize },
}

impl NarrateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn wav(path: impl Into<PathBuf>, source: hound::Error) -> Self {
        Self::Wav { path: path.into(), source }
    }
}
