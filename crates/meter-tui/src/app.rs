//! SessionController — single-owner event loop for the meter session.
//!
//! Owns the `MeterEngine`, the terminal width and the session phase. Signal
//! listeners and the level pipeline run as separate tasks that only send
//! `SessionEvent`s; every state change happens here, one event at a time, so
//! a resize or interrupt can never land in the middle of a frame.
//!
//! Phases:
//!
//! ```text
//!   Starting ──start()──▶ Running ──interrupt / end of stream / error──▶ Stopping ──▶ Stopped
//! ```

use std::io::Write;

use meter_proto::protocol::PipelineMessage;
use ratatui::crossterm::{
    cursor::{Hide, Show},
    execute, queue,
    style::Print,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::MeterEngine;
use crate::error::SessionError;
use crate::event::SessionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Why the session ended. Decides the process exit status.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    Interrupted,
    EndOfStream,
    Upstream {
        source: String,
        message: String,
        debug: Option<String>,
    },
}

impl StopReason {
    pub fn is_success(&self) -> bool {
        !matches!(self, StopReason::Upstream { .. })
    }
}

pub struct SessionController<W: Write> {
    engine: MeterEngine<W>,
    width: u16,
    phase: SessionPhase,
    stop_reason: Option<StopReason>,
    cursor_hidden: bool,
}

impl<W: Write> SessionController<W> {
    pub fn new(out: W, width: u16) -> Self {
        Self {
            engine: MeterEngine::new(out, width),
            width,
            phase: SessionPhase::Starting,
            stop_reason: None,
            cursor_hidden: false,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[cfg(test)]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[cfg(test)]
    pub fn engine(&self) -> &MeterEngine<W> {
        &self.engine
    }

    #[cfg(test)]
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    /// Take over the terminal and start accepting events.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Starting {
            return Ok(());
        }
        execute!(self.engine.writer_mut(), Hide)?;
        self.cursor_hidden = true;
        self.phase = SessionPhase::Running;
        info!("session: running at {} cols", self.width);
        Ok(())
    }

    /// Handle one event. Events outside `Running` are dropped.
    pub fn handle(&mut self, event: SessionEvent) -> Result<SessionPhase, SessionError> {
        if self.phase != SessionPhase::Running {
            debug!("session: ignoring {:?} while {:?}", event, self.phase);
            return Ok(self.phase);
        }

        match event {
            SessionEvent::Pipeline(msg) => self.on_pipeline(msg)?,
            SessionEvent::Resize(width) => self.on_resize(width),
            SessionEvent::Interrupt => {
                info!("session: interrupted");
                self.begin_stop(StopReason::Interrupted);
            }
        }

        if self.phase == SessionPhase::Stopping {
            self.finish()?;
        }
        Ok(self.phase)
    }

    /// Drive the session from `events` until it stops.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<SessionEvent>,
    ) -> Result<StopReason, SessionError> {
        self.start()?;

        while self.phase == SessionPhase::Running {
            match events.recv().await {
                Some(event) => {
                    self.handle(event)?;
                }
                None => {
                    warn!("session: event channel closed");
                    self.begin_stop(StopReason::EndOfStream);
                    self.finish()?;
                }
            }
        }

        Ok(self.stop_reason.take().unwrap_or(StopReason::EndOfStream))
    }

    fn on_pipeline(&mut self, msg: PipelineMessage) -> Result<(), SessionError> {
        match msg {
            PipelineMessage::Level(batch) => self.engine.apply(&batch)?,
            PipelineMessage::EndOfStream => {
                info!("session: end of stream");
                self.begin_stop(StopReason::EndOfStream);
            }
            PipelineMessage::Warning { source, message } => {
                warn!("{}: {}", source, message);
            }
            PipelineMessage::Error {
                source,
                message,
                debug: detail,
            } => {
                error!(
                    "{}: {} ({})",
                    source,
                    message,
                    detail.as_deref().unwrap_or("-")
                );
                self.begin_stop(StopReason::Upstream {
                    source,
                    message,
                    debug: detail,
                });
            }
            PipelineMessage::Other(text) => {
                debug!("pipeline: {}", text);
            }
        }
        Ok(())
    }

    fn on_resize(&mut self, width: u16) {
        info!("session: resize {} -> {} cols", self.width, width);
        self.width = width;
        self.engine.resize(width);
    }

    fn begin_stop(&mut self, reason: StopReason) {
        if self.stop_reason.is_none() {
            self.stop_reason = Some(reason);
        }
        self.phase = SessionPhase::Stopping;
    }

    /// Stopping → Stopped: clear the region, say why, give the cursor back.
    fn finish(&mut self) -> Result<(), SessionError> {
        self.engine.clear()?;

        let out = self.engine.writer_mut();
        queue!(out, Print("\n"))?;
        match &self.stop_reason {
            Some(StopReason::EndOfStream) => queue!(out, Print("End of stream\n"))?,
            Some(StopReason::Upstream {
                source,
                message,
                debug: detail,
            }) => {
                queue!(out, Print(format!("Error {}: {}\n", source, message)))?;
                if let Some(detail) = detail {
                    queue!(out, Print(format!("Debug: {}\n", detail)))?;
                }
            }
            Some(StopReason::Interrupted) | None => {}
        }
        execute!(out, Show)?;
        self.cursor_hidden = false;

        self.phase = SessionPhase::Stopped;
        info!(
            "session: stopped after {} frame(s): {:?}",
            self.engine.frames(),
            self.stop_reason
        );
        for (i, ch) in self.engine.channels().iter().enumerate() {
            info!("session: channel {} overs {}", i + 1, ch.total_overs());
        }
        Ok(())
    }
}

impl<W: Write> Drop for SessionController<W> {
    fn drop(&mut self) {
        if self.cursor_hidden {
            let _ = execute!(self.engine.writer_mut(), Show);
        }
    }
}
