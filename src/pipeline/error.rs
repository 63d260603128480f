use thiserror::Error;

/// Errors raised by the tasks that hand data between pipeline stages
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("channel send error: downstream stage has stopped")]
    ChannelSend,
}
