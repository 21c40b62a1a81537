//! Stagecast — headless session runner.
//!
//! Reads one JSON command per line on stdin, writes one JSON response
//! per line on stdout, and logs to stderr (or a file): the stdio split
//! is the protocol, so nothing else may ever print to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use stagecast_common::config::{LoggingConfig, SessionDefaults};
use stagecast_common::logging::init_logging;
use stagecast_engine::{MediaEngine, SimEngine};

#[derive(Parser)]
#[command(
    name = "stagecast",
    about = "Headless recording and streaming sessions driven by JSON commands on stdin",
    version,
    author
)]
struct Cli {
    /// Media engine backend
    #[arg(long, value_enum, default_value_t = EngineKind::Sim)]
    engine: EngineKind,

    /// Log filter (EnvFilter syntax; STAGECAST_LOG overrides)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit structured JSON logs
    #[arg(long)]
    log_json: bool,

    /// Append logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Session defaults file (JSON); builtin defaults when absent
    #[arg(long)]
    defaults: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineKind {
    /// Deterministic in-process engine, no media stack required
    Sim,
    /// GStreamer-backed engine (needs a build with the `gst` feature)
    Gst,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
        file: cli.log_file.clone(),
    });

    let defaults = match &cli.defaults {
        Some(path) => SessionDefaults::load_or_default(path),
        None => SessionDefaults::default(),
    };

    let engine: Arc<dyn MediaEngine> = match cli.engine {
        EngineKind::Sim => Arc::new(SimEngine::new()),
        #[cfg(feature = "gst")]
        EngineKind::Gst => Arc::new(stagecast_engine::GstEngine::new()),
        #[cfg(not(feature = "gst"))]
        EngineKind::Gst => anyhow::bail!(
            "this build does not include the GStreamer engine; rebuild with `--features gst`"
        ),
    };

    tracing::info!(engine = ?cli.engine, "stagecast starting");
    let stdin = std::io::stdin();
    stagecast_session::run(engine, defaults, stdin.lock(), std::io::stdout())?;
    tracing::info!("input closed, exiting");
    Ok(())
}
