use crate::pipeline::{PipelineError, Sender};
use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// Per-event overhead the remote service adds when it accounts batch sizes.
pub const EVENT_OVERHEAD_BYTES: usize = 26;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One non-empty input line and the wall-clock time it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }

    /// Stamp a message with the current time, at millisecond precision.
    pub fn now(message: impl Into<String>) -> Self {
        Self::new(message, Utc::now().trunc_subsecs(3))
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Size of this event as counted against a batch's byte cap
    pub fn accounted_size(&self) -> usize {
        self.message.len() + EVENT_OVERHEAD_BYTES
    }
}

/// Counters reported when the reader finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub lines_read: u64,
    pub events_sent: u64,
    pub empty_lines: u64,
    pub truncated_lines: u64,
}

/// Line scanner over any buffered async input.
///
/// Lines longer than `max_line_bytes` are cut at the last complete UTF-8
/// character that fits; the remainder of the line is read and thrown away, so
/// memory per line never exceeds the limit.
pub struct LineReader<R> {
    inner: R,
    max_line_bytes: usize,
    stats: ReaderStats,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(inner: R, max_line_bytes: usize) -> Self {
        Self {
            inner,
            max_line_bytes,
            stats: ReaderStats::default(),
        }
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Read the next line without its terminator. Returns `None` at end of input.
    pub async fn next_line(&mut self) -> Result<Option<String>, ReaderError> {
        let mut line: Vec<u8> = Vec::new();
        let mut truncated = false;
        let mut saw_input = false;

        loop {
            let (consumed, complete) = {
                let available = self.inner.fill_buf().await?;
                if available.is_empty() {
                    break;
                }
                saw_input = true;

                let (chunk, consumed, complete) =
                    match available.iter().position(|&b| b == b'\n') {
                        Some(pos) => (&available[..pos], pos + 1, true),
                        None => (available, available.len(), false),
                    };

                let room = self.max_line_bytes.saturating_sub(line.len());
                if chunk.len() > room {
                    line.extend_from_slice(&chunk[..room]);
                    truncated = true;
                } else {
                    line.extend_from_slice(chunk);
                }

                (consumed, complete)
            };

            self.inner.consume(consumed);
            if complete {
                break;
            }
        }

        if !saw_input {
            return Ok(None);
        }

        self.stats.lines_read += 1;

        if truncated {
            // Drop a multi-byte character split by the cut
            let partial = partial_tail_len(&line);
            line.truncate(line.len() - partial);
        } else if line.last() == Some(&b'\r') {
            line.pop();
        }

        let mut text = match String::from_utf8(line) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };

        // Replacement characters are wider than the bytes they stand for
        if text.len() > self.max_line_bytes {
            let mut cut = self.max_line_bytes;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            truncated = true;
        }

        if truncated {
            self.stats.truncated_lines += 1;
            warn!(
                line = self.stats.lines_read,
                max_line_bytes = self.max_line_bytes,
                "Input line exceeds limit, truncating"
            );
        }

        Ok(Some(text))
    }

    /// Read lines until a non-empty one is found and stamp it.
    pub async fn next_event(&mut self) -> Result<Option<LogEvent>, ReaderError> {
        while let Some(line) = self.next_line().await? {
            if line.is_empty() {
                self.stats.empty_lines += 1;
                continue;
            }
            return Ok(Some(LogEvent::now(line)));
        }
        Ok(None)
    }
}

/// Length of an incomplete UTF-8 sequence at the end of `bytes`, or 0.
fn partial_tail_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}

/// Run the ingestor task.
///
/// Forwards every non-empty line to `output` until end of input. A read error
/// is treated as end of input. Dropping `output` on return is what tells the
/// batcher to drain.
pub async fn run_reader<R>(
    mut reader: LineReader<R>,
    output: Sender<LogEvent>,
) -> Result<ReaderStats, PipelineError>
where
    R: AsyncBufRead + Unpin,
{
    info!("Reader started");

    loop {
        match reader.next_event().await {
            Ok(Some(event)) => {
                debug!(
                    timestamp = %event.timestamp,
                    bytes = event.message.len(),
                    "Read event"
                );
                if output.send(event).await.is_err() {
                    warn!("Event channel closed, stopping reader");
                    return Err(PipelineError::ChannelSend);
                }
                reader.stats.events_sent += 1;
            }
            Ok(None) => {
                info!("End of input reached");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Input read failed, treating as end of input");
                break;
            }
        }
    }

    let stats = reader.stats();
    info!(
        lines = stats.lines_read,
        events = stats.events_sent,
        empty = stats.empty_lines,
        truncated = stats.truncated_lines,
        "Reader shutdown complete"
    );

    Ok(stats)
}
