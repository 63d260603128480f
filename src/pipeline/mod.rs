pub mod channel;
pub mod error;

pub use channel::{create_channel, Receiver, Sender};
pub use error::PipelineError;
