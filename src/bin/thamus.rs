//! `thamus` — narrate an ebook in a cloned voice.
//!
//! Usage:
//!   thamus --book moby-dick.epub --voice voices/narrator
//!   thamus --book notes.docx --voice voices/tom --quality fast --half
//!
//! Requirements:
//!   - pandoc on $PATH (or pass --pandoc)
//!   - a voice-cloning synthesis command (see --engine-config)

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use thamus::{
    cli::{init_tracing, Cli},
    CommandEngine, CommandSpec, PandocConverter, Pipeline, ReferenceVoice,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let spec = match &cli.engine_config {
        Some(path) => CommandSpec::from_file(path)?,
        None => CommandSpec::default(),
    };
    let config = cli.engine_options();
    let output = cli.output_path();

    info!(book = %cli.book.display(), voice = %cli.voice.display(), quality = %cli.quality, "narrating");
    info!(?config, program = %spec.program, "engine");

    let voice = ReferenceVoice::load(&cli.voice)
        .with_context(|| format!("Cannot load voice from {}", cli.voice.display()))?;
    info!(clips = voice.len(), "loaded reference voice");

    let mut pipeline = Pipeline::new(
        PandocConverter::with_program(cli.pandoc.clone()),
        CommandEngine::new(spec, config),
        voice,
    )
    .with_preset(cli.quality)
    .with_policy(cli.on_error)
    .with_progress(true);

    let summary = pipeline.run(&cli.book, &output)?;

    info!(
        lines = summary.lines,
        spoken = summary.accepted,
        skipped = summary.skipped,
        failed = summary.failed.len(),
        secs = summary.duration_secs(),
        path = %summary.output.display(),
        "done"
    );
    Ok(())
}
