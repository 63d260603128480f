use crate::batcher::batch::LogBatch;
use crate::config::types::UploadConfig;
use crate::pipeline::Receiver;
use crate::service::traits::{LogService, ServiceError, StreamTarget};
use crate::uploader::cursor::StreamCursor;
use crate::uploader::mirror::Mirror;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload of batch {batch} to {target} failed: {source}")]
    Put {
        batch: u64,
        target: StreamTarget,
        #[source]
        source: ServiceError,
    },

    #[error("upload of batch {batch} to {target} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        batch: u64,
        target: StreamTarget,
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    #[error("failed to write mirror output: {0}")]
    Mirror(#[from] std::io::Error),
}

/// How failed uploads are retried. `max_retries == 0` disables every kind of
/// recovery: the first failure is returned as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self::from(&UploadConfig::default())
    }

    /// Double the wait, capped at `max_backoff`
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff)
    }
}

impl From<&UploadConfig> for RetryPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_interval: config.retry_interval,
            max_backoff: config.max_backoff,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub batches: u64,
    pub events: u64,
    pub retries: u64,
    pub rejected_events: u64,
}

/// Sends batches to one stream, one call at a time, chaining sequence tokens.
pub struct Uploader<W> {
    service: Arc<dyn LogService>,
    target: StreamTarget,
    cursor: StreamCursor,
    retry: RetryPolicy,
    mirror: Mirror<W>,
    stats: UploadStats,
}

impl<W: Write> Uploader<W> {
    pub fn new(
        service: Arc<dyn LogService>,
        target: StreamTarget,
        cursor: StreamCursor,
        retry: RetryPolicy,
        mirror: Mirror<W>,
    ) -> Self {
        Self {
            service,
            target,
            cursor,
            retry,
            mirror,
            stats: UploadStats::default(),
        }
    }

    pub fn cursor(&self) -> &StreamCursor {
        &self.cursor
    }

    pub fn stats(&self) -> UploadStats {
        self.stats
    }

    pub fn into_mirror(self) -> Mirror<W> {
        self.mirror
    }

    /// Upload one batch, then mirror it.
    pub async fn upload_batch(&mut self, batch: &LogBatch) -> Result<(), UploadError> {
        let mut retries: u32 = 0;
        let mut backoff = self.retry.retry_interval;

        loop {
            let result = self
                .service
                .put_log_events(&self.target, &batch.events, self.cursor.token())
                .await;

            match result {
                Ok(outcome) => {
                    self.cursor.advance(outcome.next_sequence_token);
                    if outcome.rejected_events > 0 {
                        warn!(
                            batch = batch.sequence_num,
                            rejected = outcome.rejected_events,
                            "Some events in batch were not stored"
                        );
                        self.stats.rejected_events += outcome.rejected_events as u64;
                    }
                    break;
                }
                Err(source) if self.retry.max_retries == 0 => {
                    return Err(UploadError::Put {
                        batch: batch.sequence_num,
                        target: self.target.clone(),
                        source,
                    });
                }
                Err(ServiceError::DataAlreadyAccepted { expected }) => {
                    // An earlier attempt of this batch landed
                    warn!(
                        batch = batch.sequence_num,
                        "Batch already accepted by service, adopting its token"
                    );
                    self.cursor.advance(expected);
                    break;
                }
                Err(source) if !source.is_retryable() || retries >= self.retry.max_retries => {
                    return Err(UploadError::RetriesExhausted {
                        batch: batch.sequence_num,
                        target: self.target.clone(),
                        attempts: retries + 1,
                        source,
                    });
                }
                Err(ServiceError::InvalidSequenceToken { expected }) => {
                    retries += 1;
                    warn!(
                        batch = batch.sequence_num,
                        attempt = retries,
                        "Sequence token rejected, retrying with the token the service expects"
                    );
                    self.cursor.advance(expected);
                }
                Err(source) => {
                    retries += 1;
                    warn!(
                        batch = batch.sequence_num,
                        attempt = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %source,
                        "Upload failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = self.retry.next_backoff(backoff);
                }
            }
        }

        self.stats.batches += 1;
        self.stats.events += batch.len() as u64;
        self.stats.retries += retries as u64;
        debug!(
            batch = batch.sequence_num,
            events = batch.len(),
            bytes = batch.accounted_bytes,
            "Uploaded batch"
        );

        self.mirror.write_batch(batch)?;
        Ok(())
    }

    /// Upload every batch from `input` in order until the channel closes.
    pub async fn run(&mut self, mut input: Receiver<LogBatch>) -> Result<UploadStats, UploadError> {
        info!(stream = %self.target, "Uploader started");

        while let Some(batch) = input.recv().await {
            self.upload_batch(&batch).await?;
        }

        info!(
            batches = self.stats.batches,
            events = self.stats.events,
            retries = self.stats.retries,
            "Batch channel closed, uploader shutdown complete"
        );

        Ok(self.stats)
    }
}
