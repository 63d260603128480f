use crate::batcher::batch::LogBatch;
use crate::batcher::policy::{BatchBuilder, BatchLimits, CutReason};
use crate::pipeline::{PipelineError, Receiver, Sender};
use crate::source::reader::LogEvent;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Run the batcher task.
///
/// Each round arms a `max_age` deadline before waiting for its first event,
/// then collects events until a cap is hit, the deadline fires, or the input
/// closes. Rounds that collect nothing emit nothing. When the input closes the
/// open batch is flushed and `output` is dropped, which ends the uploader.
pub async fn run_batcher(
    mut input: Receiver<LogEvent>,
    output: Sender<LogBatch>,
    limits: BatchLimits,
) -> Result<u64, PipelineError> {
    let mut builder = BatchBuilder::new(limits);
    let mut input_open = true;

    info!(
        max_items = limits.max_items,
        max_bytes = limits.max_bytes,
        max_age_ms = limits.max_age.as_millis() as u64,
        "Batcher started"
    );

    while input_open {
        let deadline = sleep_until(Instant::now() + limits.max_age);
        tokio::pin!(deadline);

        let reason = loop {
            tokio::select! {
                received = input.recv() => {
                    match received {
                        Some(event) => {
                            if let Some(reason) = builder.push(event) {
                                break reason;
                            }
                        }
                        None => {
                            input_open = false;
                            break CutReason::InputClosed;
                        }
                    }
                }
                _ = &mut deadline => break CutReason::MaxAge,
            }
        };

        if let Some(batch) = builder.take() {
            debug!(
                batch = batch.sequence_num,
                events = batch.len(),
                bytes = batch.accounted_bytes,
                reason = %reason,
                "Cut batch"
            );
            if output.send(batch).await.is_err() {
                return Err(PipelineError::ChannelSend);
            }
        }
    }

    let emitted = builder.sequence_counter();
    info!(batches = emitted, "Input closed, batcher shutdown complete");

    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::create_channel;
    use std::time::Duration;

    fn limits(max_items: usize, max_bytes: usize, max_age: Duration) -> BatchLimits {
        BatchLimits {
            max_items,
            max_bytes,
            max_age,
        }
    }

    fn messages(batch: &LogBatch) -> Vec<String> {
        batch.events.iter().map(|e| e.message.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_cap_emits_single_batch() {
        let (event_tx, event_rx) = create_channel(16);
        let (batch_tx, mut batch_rx) = create_channel(16);
        let handle = tokio::spawn(run_batcher(
            event_rx,
            batch_tx,
            limits(3, 1_000_000_000, Duration::from_secs(60)),
        ));

        for message in ["a", "b", "c"] {
            event_tx.send(LogEvent::now(message)).await.unwrap();
        }

        let batch = batch_rx.recv().await.unwrap();
        assert_eq!(messages(&batch), vec!["a", "b", "c"]);

        drop(event_tx);
        assert!(batch_rx.recv().await.is_none());
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_cap_splits_batches() {
        let (event_tx, event_rx) = create_channel(16);
        let (batch_tx, mut batch_rx) = create_channel(16);
        let handle = tokio::spawn(run_batcher(
            event_rx,
            batch_tx,
            limits(1000, 8_000_000, Duration::from_secs(1)),
        ));

        event_tx.send(LogEvent::now("x")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1200)).await;
        event_tx.send(LogEvent::now("y")).await.unwrap();
        drop(event_tx);

        let first = batch_rx.recv().await.unwrap();
        let second = batch_rx.recv().await.unwrap();
        assert_eq!(messages(&first), vec!["x"]);
        assert_eq!(messages(&second), vec!["y"]);
        assert_eq!(second.sequence_num, 1);
        assert!(batch_rx.recv().await.is_none());

        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_interval_emits_nothing() {
        let (event_tx, event_rx) = create_channel::<LogEvent>(16);
        let (batch_tx, mut batch_rx) = create_channel(16);
        let handle = tokio::spawn(run_batcher(
            event_rx,
            batch_tx,
            limits(1000, 8_000_000, Duration::from_secs(1)),
        ));

        // Several deadlines fire with no events
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(batch_rx.try_recv().is_err());

        event_tx.send(LogEvent::now("late")).await.unwrap();
        drop(event_tx);

        let batch = batch_rx.recv().await.unwrap();
        assert_eq!(messages(&batch), vec!["late"]);
        assert_eq!(batch.sequence_num, 0);
        assert!(batch_rx.recv().await.is_none());

        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_close_flushes_partial_batch() {
        let (event_tx, event_rx) = create_channel(16);
        let (batch_tx, mut batch_rx) = create_channel(16);
        let handle = tokio::spawn(run_batcher(
            event_rx,
            batch_tx,
            limits(1000, 8_000_000, Duration::from_secs(60)),
        ));

        for i in 0..5 {
            event_tx.send(LogEvent::now(format!("event-{}", i))).await.unwrap();
        }
        drop(event_tx);

        let batch = batch_rx.recv().await.unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(batch.events[0].message, "event-0");
        assert_eq!(batch.events[4].message, "event-4");
        assert!(batch_rx.recv().await.is_none());

        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_closes_output_without_batches() {
        let (event_tx, event_rx) = create_channel::<LogEvent>(1);
        let (batch_tx, mut batch_rx) = create_channel(1);
        drop(event_tx);

        let emitted = run_batcher(event_rx, batch_tx, BatchLimits::default())
            .await
            .unwrap();

        assert_eq!(emitted, 0);
        assert!(batch_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_output_is_an_error() {
        let (event_tx, event_rx) = create_channel(1);
        let (batch_tx, batch_rx) = create_channel(1);
        drop(batch_rx);

        event_tx.send(LogEvent::now("orphan")).await.unwrap();
        drop(event_tx);

        let result = run_batcher(event_rx, batch_tx, BatchLimits::default()).await;
        assert!(matches!(result, Err(PipelineError::ChannelSend)));
    }
}
