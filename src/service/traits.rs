use crate::source::reader::LogEvent;
use async_trait::async_trait;
use std::fmt;

/// A log group and stream pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub log_group_name: String,
    pub log_stream_name: String,
}

impl StreamTarget {
    pub fn new(log_group_name: impl Into<String>, log_stream_name: impl Into<String>) -> Self {
        Self {
            log_group_name: log_group_name.into(),
            log_stream_name: log_stream_name.into(),
        }
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.log_group_name, self.log_stream_name)
    }
}

/// One entry from a stream listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescription {
    pub log_stream_name: String,
    pub upload_sequence_token: Option<String>,
}

/// Result of a successful put
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOutcome {
    pub next_sequence_token: Option<String>,
    /// Events the service accepted the call for but declined to store
    pub rejected_events: usize,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("invalid sequence token (expected {expected:?})")]
    InvalidSequenceToken { expected: Option<String> },

    #[error("data already accepted (next token {expected:?})")]
    DataAlreadyAccepted { expected: Option<String> },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("service call failed: {0}")]
    Sdk(String),
}

impl ServiceError {
    /// Whether repeating the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Sdk(_) | ServiceError::InvalidSequenceToken { .. }
        )
    }
}

/// The four calls the pipeline makes against the remote log store.
///
/// Implementations own transport, credentials and retries at the wire
/// level; callers only see the typed outcome.
#[async_trait]
pub trait LogService: Send + Sync {
    async fn create_log_group(&self, log_group_name: &str) -> Result<(), ServiceError>;

    /// List every stream in the group whose name starts with `prefix`.
    async fn describe_log_streams(
        &self,
        log_group_name: &str,
        prefix: &str,
    ) -> Result<Vec<StreamDescription>, ServiceError>;

    async fn create_log_stream(
        &self,
        log_group_name: &str,
        log_stream_name: &str,
    ) -> Result<(), ServiceError>;

    async fn put_log_events(
        &self,
        target: &StreamTarget,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<PutOutcome, ServiceError>;
}
