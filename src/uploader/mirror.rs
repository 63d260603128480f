use crate::batcher::batch::LogBatch;
use crate::source::reader::LogEvent;
use chrono::{DateTime, Local};
use std::io::{self, Write};

/// Render an event as `<local time> <message>`
pub fn format_event(event: &LogEvent) -> String {
    let local: DateTime<Local> = event.timestamp.with_timezone(&Local);
    format!("{} {}", local.format("%Y-%m-%d %H:%M:%S%.3f %z"), event.message)
}

/// Echoes uploaded events to a writer, normally stdout.
pub struct Mirror<W> {
    writer: W,
    quiet: bool,
}

impl<W: Write> Mirror<W> {
    pub fn new(writer: W, quiet: bool) -> Self {
        Self { writer, quiet }
    }

    /// Write one line per event and flush. Does nothing when quiet.
    pub fn write_batch(&mut self, batch: &LogBatch) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        for event in &batch.events {
            writeln!(self.writer, "{}", format_event(event))?;
        }
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn batch(messages: &[&str]) -> LogBatch {
        let events: Vec<LogEvent> = messages.iter().map(|m| LogEvent::now(*m)).collect();
        let accounted_bytes = events.iter().map(LogEvent::accounted_size).sum();
        LogBatch {
            sequence_num: 0,
            events,
            accounted_bytes,
        }
    }

    #[test]
    fn test_format_uses_local_time_with_millis() {
        let timestamp = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let event = LogEvent::new("hello world", timestamp);

        let expected_time = timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S%.3f %z")
            .to_string();
        assert_eq!(format_event(&event), format!("{} hello world", expected_time));
        assert!(expected_time.contains(".123 "));
    }

    #[test]
    fn test_write_batch_preserves_order() {
        let mut mirror = Mirror::new(Vec::new(), false);
        mirror.write_batch(&batch(&["first", "second"])).unwrap();

        let output = String::from_utf8(mirror.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" first"));
        assert!(lines[1].ends_with(" second"));
    }

    #[test]
    fn test_quiet_writes_nothing() {
        let mut mirror = Mirror::new(Vec::new(), true);
        mirror.write_batch(&batch(&["hidden"])).unwrap();
        assert!(mirror.into_inner().is_empty());
    }
}
