//! Command-line arguments and log setup for the `thamus` binary.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::{
    engine::{EngineConfig, Precision, QualityPreset},
    pipeline::FailurePolicy,
};

/// Narrate an ebook in a cloned voice.
#[derive(Parser, Debug, Clone)]
#[command(name = "thamus", version, about)]
pub struct Cli {
    /// The ebook to narrate (any format pandoc can read)
    #[arg(long, value_parser = existing_file)]
    pub book: PathBuf,

    /// Directory of reference WAV clips of the voice to clone
    #[arg(long, value_parser = existing_dir)]
    pub voice: PathBuf,

    /// Quality preset; higher quality takes longer
    #[arg(long, value_enum, default_value_t = QualityPreset::Standard)]
    pub quality: QualityPreset,

    /// Reuse key/value state during generation (default)
    #[arg(long = "kv-cache", overrides_with = "no_kv_cache")]
    pub kv_cache: bool,

    /// Disable key/value caching
    #[arg(long = "no-kv-cache", overrides_with = "kv_cache")]
    pub no_kv_cache: bool,

    /// Use the engine's inference accelerator (default)
    #[arg(long = "use-accelerator", overrides_with = "no_accelerator")]
    pub use_accelerator: bool,

    /// Do not use the inference accelerator
    #[arg(long = "no-accelerator", overrides_with = "use_accelerator")]
    pub no_accelerator: bool,

    /// Full (32-bit) precision: higher fidelity, slower (default)
    #[arg(long, overrides_with = "half")]
    pub full: bool,

    /// Half (16-bit) precision: faster, less memory
    #[arg(long, overrides_with = "full")]
    pub half: bool,

    /// Where to write the narration [default: the book path with a .wav extension]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON file describing the synthesis command to run for each line
    #[arg(long)]
    pub engine_config: Option<PathBuf>,

    /// What to do when synthesis fails on a line
    #[arg(long, value_enum, default_value_t = FailurePolicy::Abort)]
    pub on_error: FailurePolicy,

    /// pandoc executable used to read the book
    #[arg(long, default_value = "pandoc")]
    pub pandoc: String,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn engine_options(&self) -> EngineConfig {
        EngineConfig {
            kv_cache: !self.no_kv_cache,
            accelerator: !self.no_accelerator,
            precision: if self.half { Precision::Half } else { Precision::Full },
        }
    }

    /// The output path: `--output`, or the book with its extension swapped.
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| self.book.with_extension("wav"))
    }
}

fn existing_file(s: &str) -> Result<PathBuf, String> {
    let path = Path::new(s);
    if path.is_file() {
        Ok(path.to_path_buf())
    } else if path.exists() {
        Err(format!("'{s}' is not a regular file"))
    } else {
        Err(format!("'{s}' does not exist"))
    }
}

fn existing_dir(s: &str) -> Result<PathBuf, String> {
    let path = Path::new(s);
    if path.is_dir() {
        Ok(path.to_path_buf())
    } else if path.exists() {
        Err(format!("'{s}' is not a directory"))
    } else {
        Err(format!("'{s}' does not exist"))
    }
}

/// Install the global `tracing` subscriber.  `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
