pub mod bootstrap;
pub mod cursor;
pub mod mirror;
pub mod runner;

pub use bootstrap::{bootstrap_stream, ensure_log_group, BootstrapError};
pub use cursor::StreamCursor;
pub use mirror::{format_event, Mirror};
pub use runner::{RetryPolicy, UploadError, UploadStats, Uploader};
