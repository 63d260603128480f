use crate::config::types::AwsConfig;
use crate::service::traits::{
    LogService, PutOutcome, ServiceError, StreamDescription, StreamTarget,
};
use crate::source::reader::LogEvent;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudwatchlogs::config::Region;
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, SdkError};
use aws_sdk_cloudwatchlogs::operation::put_log_events::PutLogEventsError;
use aws_sdk_cloudwatchlogs::types::{InputLogEvent, RejectedLogEventsInfo};
use aws_sdk_cloudwatchlogs::Client;
use std::fmt::Debug;
use tracing::{debug, warn};

/// [`LogService`] backed by the AWS SDK.
///
/// Credentials and region come from the SDK's default provider chain unless
/// the config overrides the region or endpoint.
#[derive(Debug, Clone)]
pub struct CloudWatchLogService {
    client: Client,
}

impl CloudWatchLogService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn from_config(config: &AwsConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url.clone());
        }

        let sdk_config = loader.load().await;
        debug!(region = ?sdk_config.region(), "Loaded AWS configuration");

        Self::new(Client::new(&sdk_config))
    }
}

fn sdk_error<E, R>(err: SdkError<E, R>) -> ServiceError
where
    E: std::error::Error + 'static,
    R: Debug + 'static,
{
    ServiceError::Sdk(DisplayErrorContext(&err).to_string())
}

#[allow(deprecated)]
fn put_error<R: Debug + 'static>(
    err: SdkError<PutLogEventsError, R>,
    target: &StreamTarget,
) -> ServiceError {
    let mapped = match err.as_service_error() {
        Some(PutLogEventsError::InvalidSequenceTokenException(e)) => {
            Some(ServiceError::InvalidSequenceToken {
                expected: e.expected_sequence_token().map(str::to_string),
            })
        }
        Some(PutLogEventsError::DataAlreadyAcceptedException(e)) => {
            Some(ServiceError::DataAlreadyAccepted {
                expected: e.expected_sequence_token().map(str::to_string),
            })
        }
        Some(PutLogEventsError::ResourceNotFoundException(_)) => {
            Some(ServiceError::ResourceNotFound(target.to_string()))
        }
        Some(PutLogEventsError::InvalidParameterException(e)) => Some(ServiceError::Rejected(
            e.message().unwrap_or("invalid parameter").to_string(),
        )),
        _ => None,
    };

    mapped.unwrap_or_else(|| sdk_error(err))
}

/// Number of events a partially rejected put dropped.
///
/// The service reports inclusive end indexes for too-old and expired events
/// and an inclusive start index for too-new ones.
fn count_rejected(total: usize, info: &RejectedLogEventsInfo) -> usize {
    let index = |value: Option<i32>| value.and_then(|v| usize::try_from(v).ok());

    let head = [
        index(info.too_old_log_event_end_index()),
        index(info.expired_log_event_end_index()),
    ]
    .into_iter()
    .flatten()
    .map(|end| (end + 1).min(total))
    .max()
    .unwrap_or(0);

    let tail = index(info.too_new_log_event_start_index())
        .map(|start| total.saturating_sub(start.max(head)))
        .unwrap_or(0);

    head + tail
}

#[async_trait]
impl LogService for CloudWatchLogService {
    async fn create_log_group(&self, log_group_name: &str) -> Result<(), ServiceError> {
        match self
            .client
            .create_log_group()
            .log_group_name(log_group_name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_already_exists_exception())
                {
                    return Err(ServiceError::AlreadyExists(log_group_name.to_string()));
                }
                Err(sdk_error(err))
            }
        }
    }

    #[allow(deprecated)]
    async fn describe_log_streams(
        &self,
        log_group_name: &str,
        prefix: &str,
    ) -> Result<Vec<StreamDescription>, ServiceError> {
        let mut streams = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_log_streams()
                .log_group_name(log_group_name)
                .log_stream_name_prefix(prefix)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| {
                    if err
                        .as_service_error()
                        .is_some_and(|e| e.is_resource_not_found_exception())
                    {
                        ServiceError::ResourceNotFound(log_group_name.to_string())
                    } else {
                        sdk_error(err)
                    }
                })?;

            for stream in output.log_streams() {
                if let Some(name) = stream.log_stream_name() {
                    streams.push(StreamDescription {
                        log_stream_name: name.to_string(),
                        upload_sequence_token: stream.upload_sequence_token().map(str::to_string),
                    });
                }
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(streams)
    }

    async fn create_log_stream(
        &self,
        log_group_name: &str,
        log_stream_name: &str,
    ) -> Result<(), ServiceError> {
        match self
            .client
            .create_log_stream()
            .log_group_name(log_group_name)
            .log_stream_name(log_stream_name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_already_exists_exception())
                {
                    return Err(ServiceError::AlreadyExists(log_stream_name.to_string()));
                }
                Err(sdk_error(err))
            }
        }
    }

    #[allow(deprecated)]
    async fn put_log_events(
        &self,
        target: &StreamTarget,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<PutOutcome, ServiceError> {
        let log_events = events
            .iter()
            .map(|event| {
                InputLogEvent::builder()
                    .message(event.message.clone())
                    .timestamp(event.timestamp_millis())
                    .build()
                    .map_err(|e| ServiceError::Rejected(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .put_log_events()
            .log_group_name(&target.log_group_name)
            .log_stream_name(&target.log_stream_name)
            .set_log_events(Some(log_events))
            .set_sequence_token(sequence_token.map(str::to_string))
            .send()
            .await
            .map_err(|err| put_error(err, target))?;

        let rejected_events = output
            .rejected_log_events_info()
            .map(|info| {
                warn!(stream = %target, info = ?info, "Service rejected part of a batch");
                count_rejected(events.len(), info)
            })
            .unwrap_or(0);

        Ok(PutOutcome {
            next_sequence_token: output.next_sequence_token().map(str::to_string),
            rejected_events,
        })
    }
}
