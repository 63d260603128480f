pub mod cloudwatch;
pub mod memory;
pub mod traits;

pub use cloudwatch::CloudWatchLogService;
pub use memory::{MemoryLogService, ServiceCall};
pub use traits::{LogService, PutOutcome, ServiceError, StreamDescription, StreamTarget};
