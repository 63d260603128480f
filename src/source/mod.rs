pub mod reader;

pub use reader::{run_reader, LineReader, LogEvent, ReaderError, ReaderStats, EVENT_OVERHEAD_BYTES};
