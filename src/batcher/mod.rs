pub mod batch;
pub mod policy;
pub mod runner;

pub use batch::LogBatch;
pub use policy::{BatchBuilder, BatchLimits, CutReason};
pub use runner::run_batcher;
