//! Errors the session can hit. Everything here is fatal for the session; the
//! binary reports it once and exits with a failure status.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Writing the frame or a control sequence to the terminal failed.
    #[error("terminal write failed: {0}")]
    Terminal(#[from] io::Error),

    /// The terminal width could not be determined at startup.
    #[error("cannot determine terminal size: {0}")]
    TerminalSize(#[source] io::Error),

    /// The level pipeline could not be started.
    #[error("cannot start {source_name}: {reason}")]
    PipelineSpawn { source_name: String, reason: String },
}
