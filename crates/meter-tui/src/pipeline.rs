//! Level pipeline — produces `PipelineMessage`s for the session.
//!
//! The measurements themselves come from ffmpeg's `astats` filter, printed
//! per analysis window through `ametadata`. Either we spawn ffmpeg ourselves
//! on the configured input, or the user pipes that same stream into stdin.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::Stdio;

use meter_proto::ametadata::AmetadataParser;
use meter_proto::config::{SourceConfig, SourceKind};
use meter_proto::protocol::PipelineMessage;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::event::SessionEvent;

/// Resampling rate fed to astats so the window length is exact.
const ANALYSIS_RATE: u64 = 48_000;

/// A running level source.
pub enum SourceTask {
    Ffmpeg(tokio::task::JoinHandle<()>),
    /// Plain OS thread: a read parked on stdin cannot be cancelled, and on
    /// tokio's blocking pool it would hold up runtime shutdown.
    Stdin(std::thread::JoinHandle<()>),
}

impl SourceTask {
    /// Stop producing events. The stdin thread is left detached and goes
    /// away with the process.
    pub fn stop(self) {
        match self {
            SourceTask::Ffmpeg(task) => task.abort(),
            SourceTask::Stdin(reader) => {
                debug!(
                    "pipeline: detaching {} thread",
                    reader.thread().name().unwrap_or("stdin")
                );
            }
        }
    }
}

/// Start the configured source. It finishes after sending `EndOfStream` or
/// `Error`, or as soon as the session stops listening.
pub fn spawn_source(
    config: &SourceConfig,
    tx: mpsc::Sender<SessionEvent>,
) -> Result<SourceTask, SessionError> {
    match config.kind {
        SourceKind::Ffmpeg => spawn_ffmpeg(config, tx).map(SourceTask::Ffmpeg),
        SourceKind::Stdin => {
            info!("pipeline: reading ametadata from stdin");
            std::thread::Builder::new()
                .name("lvl-stdin".to_string())
                .spawn(move || {
                    let stdin = std::io::stdin().lock();
                    let done = match forward_lines_blocking(stdin, &tx) {
                        Ok(true) => PipelineMessage::EndOfStream,
                        Ok(false) => return,
                        Err(e) => PipelineMessage::Error {
                            source: "stdin".to_string(),
                            message: e.to_string(),
                            debug: None,
                        },
                    };
                    let _ = tx.blocking_send(done.into());
                })
                .map(SourceTask::Stdin)
                .map_err(|e| SessionError::PipelineSpawn {
                    source_name: "stdin reader".to_string(),
                    reason: e.to_string(),
                })
        }
    }
}

/// astats + ametadata filter graph for one analysis window of `interval_ms`.
pub fn filter_graph(interval_ms: u64) -> String {
    let window = (ANALYSIS_RATE * interval_ms.max(1) / 1000).max(1);
    format!(
        "aresample={rate},asetnsamples=n={window}:p=0,astats=metadata=1:reset=1,ametadata=mode=print:file=-",
        rate = ANALYSIS_RATE,
        window = window,
    )
}

pub fn ffmpeg_args(config: &SourceConfig) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if !config.input_format.is_empty() {
        args.push("-f".to_string());
        args.push(config.input_format.clone());
    }
    args.push("-i".to_string());
    args.push(config.input.clone());
    args.extend(
        ["-vn", "-af"]
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(filter_graph(config.interval_ms)))
            .chain(["-f", "null", "-"].iter().map(|s| s.to_string())),
    );
    args
}

fn spawn_ffmpeg(
    config: &SourceConfig,
    tx: mpsc::Sender<SessionEvent>,
) -> Result<tokio::task::JoinHandle<()>, SessionError> {
    let ffmpeg_bin = meter_proto::platform::find_ffmpeg_binary()
        .unwrap_or_else(|| PathBuf::from("ffmpeg"));
    let args = ffmpeg_args(config);
    info!("pipeline: {} {}", ffmpeg_bin.display(), args.join(" "));

    let mut cmd = Command::new(&ffmpeg_bin);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group: Ctrl-C is ours to handle, not ffmpeg's.
    #[cfg(unix)]
    cmd.process_group(0);

    let spawn_err = |reason: String| SessionError::PipelineSpawn {
        source_name: ffmpeg_bin.display().to_string(),
        reason,
    };
    let mut child = cmd.spawn().map_err(|e| spawn_err(e.to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| spawn_err("stdout not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| spawn_err("stderr not captured".to_string()))?;

    Ok(tokio::spawn(async move {
        let stderr_task = tokio::spawn(last_stderr_line(stderr, tx.clone()));

        let forwarded = forward_lines(BufReader::new(stdout), &tx).await;
        if let Ok(false) = forwarded {
            debug!("pipeline: session gone, stopping ffmpeg");
            let _ = child.kill().await;
            return;
        }

        let status = child.wait().await;
        let last_line = stderr_task.await.ok().flatten();

        let done = match (forwarded, status) {
            (Err(e), _) => PipelineMessage::Error {
                source: "ffmpeg".to_string(),
                message: format!("reading output: {}", e),
                debug: last_line,
            },
            (Ok(_), Err(e)) => PipelineMessage::Error {
                source: "ffmpeg".to_string(),
                message: format!("waiting for exit: {}", e),
                debug: last_line,
            },
            (Ok(_), Ok(status)) if status.success() => PipelineMessage::EndOfStream,
            (Ok(_), Ok(status)) => PipelineMessage::Error {
                source: "ffmpeg".to_string(),
                message: last_line.unwrap_or_else(|| "exited without a message".to_string()),
                debug: Some(status.to_string()),
            },
        };
        let _ = tx.send(done.into()).await;
    }))
}

/// Pass ffmpeg's stderr on as warnings and keep the last line as the
/// failure reason.
async fn last_stderr_line<R: AsyncRead + Unpin>(
    stderr: R,
    tx: mpsc::Sender<SessionEvent>,
) -> Option<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut last = None;
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let warning = PipelineMessage::Warning {
            source: "ffmpeg".to_string(),
            message: line.clone(),
        };
        if tx.send(warning.into()).await.is_err() {
            debug!("pipeline: dropping ffmpeg stderr, session gone");
        }
        last = Some(line);
    }
    last
}

/// Parse an ametadata stream and forward each batch as it completes.
/// Returns `Ok(false)` if the session stopped listening first.
pub async fn forward_lines<R: AsyncBufRead + Unpin>(
    reader: R,
    tx: &mpsc::Sender<SessionEvent>,
) -> std::io::Result<bool> {
    let mut parser = AmetadataParser::new();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(msg) = parser.feed_line(&line) {
            if tx.send(msg.into()).await.is_err() {
                return Ok(false);
            }
        }
    }
    if let Some(msg) = parser.finish() {
        if tx.send(msg.into()).await.is_err() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Blocking twin of [`forward_lines`] for readers that live on their own
/// thread.
pub fn forward_lines_blocking<R: BufRead>(
    reader: R,
    tx: &mpsc::Sender<SessionEvent>,
) -> std::io::Result<bool> {
    let mut parser = AmetadataParser::new();
    for line in reader.lines() {
        if let Some(msg) = parser.feed_line(&line?) {
            if tx.blocking_send(msg.into()).is_err() {
                return Ok(false);
            }
        }
    }
    if let Some(msg) = parser.finish() {
        if tx.blocking_send(msg.into()).is_err() {
            return Ok(false);
        }
    }
    Ok(true)
}
