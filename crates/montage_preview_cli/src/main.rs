// SPDX-License-Identifier: MIT OR Apache-2.0
//! Montage preview driver.
//!
//! Loads a montage, replays preview commands against a
//! [`PreviewController`] and prints the playback state after each one.
//!
//! ```text
//! montage_preview demos/combo.ron normal:Loop loop:off forward forward end
//! ```

mod script;

use clap::Parser;
use montage_preview::{Montage, MontageError, PreviewController, PreviewSettings, SettingsError};
use script::{describe, PreviewCommand, ScriptError};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Replay montage preview commands
#[derive(Debug, Parser)]
#[command(name = "montage_preview", version, about)]
struct Args {
    /// Montage file (RON)
    montage: PathBuf,

    /// Preview settings file (RON)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Commands to run in order, e.g. `normal:Loop`, `loop:off`, `forward`, `tick:0.5`
    commands: Vec<String>,
}

/// Error raised by the driver
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Montage could not be loaded
    #[error("Montage error: {0}")]
    Montage(#[from] MontageError),

    /// Settings could not be loaded
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Command could not be parsed
    #[error("Command error: {0}")]
    Script(#[from] ScriptError),
}

fn main() {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "montage_preview=debug".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(Args::parse()) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), CliError> {
    // Reject typos before touching any file
    let commands = args
        .commands
        .iter()
        .map(|command| command.parse::<PreviewCommand>())
        .collect::<Result<Vec<_>, _>>()?;

    let settings = match &args.settings {
        Some(path) => PreviewSettings::load(path)?,
        None => PreviewSettings::default(),
    };
    let montage = Montage::load(&args.montage)?;

    let mut controller = PreviewController::new(settings);
    controller.set_montage(Some(montage));
    println!("{:<16} {}", "load", describe(&controller));

    for command in &commands {
        if let Err(err) = command.apply(&mut controller) {
            tracing::warn!("'{command}' ignored: {err}");
        }
        println!("{:<16} {}", command.to_string(), describe(&controller));
    }

    Ok(())
}
