mod app;
mod components;
mod engine;
mod error;
mod event;
mod meter_state;
mod pipeline;
mod signals;
mod theme;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use meter_proto::config::{Config, SourceKind};
use ratatui::crossterm::terminal;
use tokio::sync::mpsc;

use crate::app::{SessionController, StopReason};
use crate::error::SessionError;
use crate::event::SessionEvent;

/// Room for a burst of batches while a frame is being written.
const EVENT_QUEUE: usize = 256;

/// Peak/RMS level meter for the terminal.
#[derive(Debug, Parser)]
#[command(name = "lvl", version, about)]
struct Cli {
    /// Read an ffmpeg `astats`/`ametadata=mode=print` stream from stdin
    /// instead of spawning ffmpeg.
    #[arg(long)]
    stdin: bool,

    /// ffmpeg input format (`pulse`, `alsa`, `avfoundation`, ...).
    /// Pass an empty string to let ffmpeg probe files and URLs.
    #[arg(short = 'f', long = "format")]
    format: Option<String>,

    /// ffmpeg input: capture device, file or URL.
    #[arg(short, long)]
    input: Option<String>,

    /// Analysis window in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Config file to use instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only look for ffmpeg on PATH.
    #[arg(long)]
    use_system_deps: bool,
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        if self.stdin {
            config.source.kind = SourceKind::Stdin;
        }
        if let Some(format) = &self.format {
            config.source.input_format = format.clone();
        }
        if let Some(input) = &self.input {
            config.source.input = input.clone();
            // A file or URL on the command line is not a capture device.
            if self.format.is_none() && looks_like_media(input) {
                config.source.input_format.clear();
            }
        }
        if let Some(ms) = self.interval_ms {
            config.source.interval_ms = ms;
        }
    }
}

fn looks_like_media(input: &str) -> bool {
    input.contains("://") || Path::new(input).is_file()
}

fn init_logging(log_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,lvl=debug".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<StopReason> {
    meter_proto::platform::set_use_system_deps(cli.use_system_deps);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli.apply_to(&mut config);

    init_logging(&config.paths.log_file)?;
    eprintln!("lvl log: {}", config.paths.log_file.display());
    tracing::info!("lvl starting: {:?}", config.source);

    let (width, _) = terminal::size().map_err(SessionError::TerminalSize)?;

    let (tx, rx) = mpsc::channel::<SessionEvent>(EVENT_QUEUE);
    signals::spawn_signal_listeners(tx.clone()).context("installing signal handlers")?;
    let source = pipeline::spawn_source(&config.source, tx)?;

    let session = SessionController::new(std::io::stdout(), width);
    let reason = session.run(rx).await;
    source.stop();

    let reason = reason?;
    tracing::info!("lvl exiting: {:?}", reason);
    Ok(reason)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(reason) if reason.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("fatal: {:#}", e);
            eprintln!("lvl: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from(["lvl", "--stdin", "--interval-ms", "100", "-f", "alsa"]);
        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert_eq!(config.source.kind, SourceKind::Stdin);
        assert_eq!(config.source.interval_ms, 100);
        assert_eq!(config.source.input_format, "alsa");
    }

    #[test]
    fn test_url_input_drops_capture_format() {
        let cli = Cli::parse_from(["lvl", "-i", "https://example.com/stream.mp3"]);
        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert_eq!(config.source.kind, SourceKind::Ffmpeg);
        assert_eq!(config.source.input, "https://example.com/stream.mp3");
        assert!(config.source.input_format.is_empty());
    }

    #[test]
    fn test_device_input_keeps_capture_format() {
        let cli = Cli::parse_from(["lvl", "-i", "hw:1"]);
        let mut config = Config::default();
        let default_format = config.source.input_format.clone();
        cli.apply_to(&mut config);
        assert_eq!(config.source.input_format, default_format);
    }
}
