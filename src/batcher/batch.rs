use crate::source::reader::LogEvent;

/// An ordered, non-empty group of events destined for a single upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBatch {
    /// Monotonic batch number, starting at 0
    pub sequence_num: u64,

    /// Events in arrival order
    pub events: Vec<LogEvent>,

    /// Sum of `LogEvent::accounted_size` over `events`
    pub accounted_bytes: usize,
}

impl LogBatch {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
