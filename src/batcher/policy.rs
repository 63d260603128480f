use crate::batcher::batch::LogBatch;
use crate::config::types::BatchConfig;
use crate::source::reader::LogEvent;
use std::fmt;
use std::time::Duration;

/// The three caps that bound a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_items: usize,
    pub max_bytes: usize,
    pub max_age: Duration,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_items: 1000,
            max_bytes: 8_000_000,
            max_age: Duration::from_secs(1),
        }
    }
}

impl From<&BatchConfig> for BatchLimits {
    fn from(config: &BatchConfig) -> Self {
        Self {
            max_items: config.max_items,
            max_bytes: config.max_bytes,
            max_age: config.max_age,
        }
    }
}

/// Why a batch was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutReason {
    MaxItems,
    MaxBytes,
    MaxAge,
    InputClosed,
}

impl fmt::Display for CutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CutReason::MaxItems => "max_items",
            CutReason::MaxBytes => "max_bytes",
            CutReason::MaxAge => "max_age",
            CutReason::InputClosed => "input_closed",
        };
        f.write_str(reason)
    }
}

/// Accumulates events into the open batch and decides when it is full.
///
/// The age cap is not tracked here; the runner owns the clock and calls
/// [`BatchBuilder::take`] when the deadline fires.
pub struct BatchBuilder {
    limits: BatchLimits,
    events: Vec<LogEvent>,
    accounted_bytes: usize,
    sequence_counter: u64,
}

impl BatchBuilder {
    pub fn new(limits: BatchLimits) -> Self {
        Self {
            limits,
            events: Vec::new(),
            accounted_bytes: 0,
            sequence_counter: 0,
        }
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    /// Append an event to the open batch.
    ///
    /// Returns the reason the batch must be cut now, if any. The event that
    /// pushes the byte total past `max_bytes` stays in this batch.
    pub fn push(&mut self, event: LogEvent) -> Option<CutReason> {
        self.accounted_bytes += event.accounted_size();
        self.events.push(event);

        if self.events.len() == self.limits.max_items {
            Some(CutReason::MaxItems)
        } else if self.accounted_bytes > self.limits.max_bytes {
            Some(CutReason::MaxBytes)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn accounted_bytes(&self) -> usize {
        self.accounted_bytes
    }

    /// Close the open batch. Returns `None` when nothing was collected, in
    /// which case no sequence number is consumed.
    pub fn take(&mut self) -> Option<LogBatch> {
        if self.events.is_empty() {
            return None;
        }

        let batch = LogBatch {
            sequence_num: self.sequence_counter,
            events: std::mem::take(&mut self.events),
            accounted_bytes: std::mem::replace(&mut self.accounted_bytes, 0),
        };
        self.sequence_counter += 1;
        Some(batch)
    }

    /// Number of batches emitted so far
    pub fn sequence_counter(&self) -> u64 {
        self.sequence_counter
    }
}
