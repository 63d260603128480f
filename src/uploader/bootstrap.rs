use crate::service::traits::{LogService, ServiceError, StreamTarget};
use crate::uploader::cursor::StreamCursor;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to create log group '{group}': {source}")]
    CreateLogGroup {
        group: String,
        #[source]
        source: ServiceError,
    },

    #[error("failed to list log streams in '{group}': {source}")]
    DescribeLogStreams {
        group: String,
        #[source]
        source: ServiceError,
    },

    #[error("failed to create log stream '{stream}': {source}")]
    CreateLogStream {
        stream: String,
        #[source]
        source: ServiceError,
    },
}

/// Create the log group, accepting one that already exists.
pub async fn ensure_log_group(
    service: &dyn LogService,
    log_group_name: &str,
) -> Result<(), BootstrapError> {
    match service.create_log_group(log_group_name).await {
        Ok(()) => {
            info!(group = %log_group_name, "Created log group");
            Ok(())
        }
        Err(ServiceError::AlreadyExists(_)) => {
            debug!(group = %log_group_name, "Log group already exists");
            Ok(())
        }
        Err(source) => Err(BootstrapError::CreateLogGroup {
            group: log_group_name.to_string(),
            source,
        }),
    }
}

/// Prepare the target stream and return the cursor for the first upload.
///
/// An existing stream (exact name match) is reused with its current upload
/// token, which may itself be absent if the stream has never been written.
/// Otherwise the stream is created and the cursor starts empty.
pub async fn bootstrap_stream(
    service: &dyn LogService,
    target: &StreamTarget,
) -> Result<StreamCursor, BootstrapError> {
    ensure_log_group(service, &target.log_group_name).await?;

    let streams = service
        .describe_log_streams(&target.log_group_name, &target.log_stream_name)
        .await
        .map_err(|source| BootstrapError::DescribeLogStreams {
            group: target.log_group_name.clone(),
            source,
        })?;

    if let Some(existing) = streams
        .into_iter()
        .find(|s| s.log_stream_name == target.log_stream_name)
    {
        info!(
            stream = %target,
            has_token = existing.upload_sequence_token.is_some(),
            "Resuming existing log stream"
        );
        return Ok(StreamCursor::new(existing.upload_sequence_token));
    }

    service
        .create_log_stream(&target.log_group_name, &target.log_stream_name)
        .await
        .map_err(|source| BootstrapError::CreateLogStream {
            stream: target.log_stream_name.clone(),
            source,
        })?;
    info!(stream = %target, "Created log stream");

    Ok(StreamCursor::default())
}
