use crate::service::traits::{
    LogService, PutOutcome, ServiceError, StreamDescription, StreamTarget,
};
use crate::source::reader::LogEvent;
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// A call made against [`MemoryLogService`], in the order it arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    CreateLogGroup {
        log_group_name: String,
    },
    DescribeLogStreams {
        log_group_name: String,
        prefix: String,
    },
    CreateLogStream {
        log_group_name: String,
        log_stream_name: String,
    },
    PutLogEvents {
        target: StreamTarget,
        messages: Vec<String>,
        sequence_token: Option<String>,
    },
}

#[derive(Debug, Default)]
struct MemoryStream {
    upload_sequence_token: Option<String>,
    events: Vec<LogEvent>,
    puts: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    groups: BTreeMap<String, BTreeMap<String, MemoryStream>>,
    calls: Vec<ServiceCall>,
    create_group_failures: VecDeque<ServiceError>,
    describe_failures: VecDeque<ServiceError>,
    create_stream_failures: VecDeque<ServiceError>,
    put_failures: VecDeque<ServiceError>,
}

/// In-process log store that enforces the same token chaining as the real
/// service.
///
/// Each successful put on a stream returns the next token in the sequence
/// `t1`, `t2`, ... and the following put must present it. A stream created
/// with [`MemoryLogService::with_stream`] and a token of `t0` therefore hands
/// out `t1` on its first put. Every call is recorded; failures can be queued
/// per operation.
#[derive(Debug, Default)]
pub struct MemoryLogService {
    state: Mutex<MemoryState>,
}

impl MemoryLogService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, log_group_name: &str) -> Self {
        self.lock()
            .groups
            .entry(log_group_name.to_string())
            .or_default();
        self
    }

    /// Pre-create a stream (and its group) holding `token` as its next
    /// expected sequence token.
    pub fn with_stream(self, log_group_name: &str, log_stream_name: &str, token: Option<&str>) -> Self {
        self.lock()
            .groups
            .entry(log_group_name.to_string())
            .or_default()
            .insert(
                log_stream_name.to_string(),
                MemoryStream {
                    upload_sequence_token: token.map(str::to_string),
                    ..MemoryStream::default()
                },
            );
        self
    }

    pub fn fail_next_create_group(&self, error: ServiceError) {
        self.lock().create_group_failures.push_back(error);
    }

    pub fn fail_next_describe(&self, error: ServiceError) {
        self.lock().describe_failures.push_back(error);
    }

    pub fn fail_next_create_stream(&self, error: ServiceError) {
        self.lock().create_stream_failures.push_back(error);
    }

    pub fn fail_next_put(&self, error: ServiceError) {
        self.lock().put_failures.push_back(error);
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    /// Sequence tokens presented by each put, in call order
    pub fn put_tokens(&self) -> Vec<Option<String>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ServiceCall::PutLogEvents { sequence_token, .. } => Some(sequence_token.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_stream(&self, log_group_name: &str, log_stream_name: &str) -> bool {
        self.lock()
            .groups
            .get(log_group_name)
            .is_some_and(|streams| streams.contains_key(log_stream_name))
    }

    /// Messages stored in a stream, in upload order
    pub fn messages(&self, log_group_name: &str, log_stream_name: &str) -> Vec<String> {
        self.lock()
            .groups
            .get(log_group_name)
            .and_then(|streams| streams.get(log_stream_name))
            .map(|stream| stream.events.iter().map(|e| e.message.clone()).collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LogService for MemoryLogService {
    async fn create_log_group(&self, log_group_name: &str) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::CreateLogGroup {
            log_group_name: log_group_name.to_string(),
        });

        if let Some(error) = state.create_group_failures.pop_front() {
            return Err(error);
        }
        if state.groups.contains_key(log_group_name) {
            return Err(ServiceError::AlreadyExists(log_group_name.to_string()));
        }

        state.groups.insert(log_group_name.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn describe_log_streams(
        &self,
        log_group_name: &str,
        prefix: &str,
    ) -> Result<Vec<StreamDescription>, ServiceError> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::DescribeLogStreams {
            log_group_name: log_group_name.to_string(),
            prefix: prefix.to_string(),
        });

        if let Some(error) = state.describe_failures.pop_front() {
            return Err(error);
        }

        let streams = state
            .groups
            .get(log_group_name)
            .ok_or_else(|| ServiceError::ResourceNotFound(log_group_name.to_string()))?;

        Ok(streams
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, stream)| StreamDescription {
                log_stream_name: name.clone(),
                upload_sequence_token: stream.upload_sequence_token.clone(),
            })
            .collect())
    }

    async fn create_log_stream(
        &self,
        log_group_name: &str,
        log_stream_name: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::CreateLogStream {
            log_group_name: log_group_name.to_string(),
            log_stream_name: log_stream_name.to_string(),
        });

        if let Some(error) = state.create_stream_failures.pop_front() {
            return Err(error);
        }

        let streams = state
            .groups
            .get_mut(log_group_name)
            .ok_or_else(|| ServiceError::ResourceNotFound(log_group_name.to_string()))?;
        if streams.contains_key(log_stream_name) {
            return Err(ServiceError::AlreadyExists(log_stream_name.to_string()));
        }

        streams.insert(log_stream_name.to_string(), MemoryStream::default());
        Ok(())
    }

    async fn put_log_events(
        &self,
        target: &StreamTarget,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<PutOutcome, ServiceError> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::PutLogEvents {
            target: target.clone(),
            messages: events.iter().map(|e| e.message.clone()).collect(),
            sequence_token: sequence_token.map(str::to_string),
        });

        if let Some(error) = state.put_failures.pop_front() {
            return Err(error);
        }

        let stream = state
            .groups
            .get_mut(&target.log_group_name)
            .and_then(|streams| streams.get_mut(&target.log_stream_name))
            .ok_or_else(|| ServiceError::ResourceNotFound(target.to_string()))?;

        if stream.upload_sequence_token.as_deref() != sequence_token {
            return Err(ServiceError::InvalidSequenceToken {
                expected: stream.upload_sequence_token.clone(),
            });
        }

        stream.puts += 1;
        stream.events.extend_from_slice(events);
        let next = format!("t{}", stream.puts);
        stream.upload_sequence_token = Some(next.clone());

        Ok(PutOutcome {
            next_sequence_token: Some(next),
            rejected_events: 0,
        })
    }
}
