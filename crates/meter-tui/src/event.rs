//! Everything the session loop reacts to, funnelled into one channel.

use meter_proto::protocol::PipelineMessage;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A message from the level pipeline.
    Pipeline(PipelineMessage),
    /// The terminal now has this many columns.
    Resize(u16),
    /// Ctrl-C / SIGINT.
    Interrupt,
}

impl From<PipelineMessage> for SessionEvent {
    fn from(msg: PipelineMessage) -> Self {
        SessionEvent::Pipeline(msg)
    }
}
