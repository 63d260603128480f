use crate::batcher::{run_batcher, BatchLimits, LogBatch};
use crate::config::parse::{load_config, validate_config, ConfigError};
use crate::config::types::{Config, TargetConfig};
use crate::config::resolve_config_path;
use crate::pipeline::{create_channel, PipelineError};
use crate::service::{CloudWatchLogService, LogService, StreamTarget};
use crate::source::reader::{run_reader, LineReader, LogEvent, ReaderStats};
use crate::uploader::{
    bootstrap_stream, BootstrapError, Mirror, RetryPolicy, UploadError, UploadStats, Uploader,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, BufReader};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Settings taken from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub log_group_name: String,
    pub log_stream_name: Option<String>,
    pub quiet: bool,
    pub max_items: Option<usize>,
    pub max_bytes: Option<usize>,
    pub max_age: Option<Duration>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

/// What a completed run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub reader: ReaderStats,
    pub batches: u64,
    pub upload: UploadStats,
}

/// `<group>/<time-based uuid>`, unique per invocation
pub fn default_stream_name(log_group_name: &str) -> String {
    let mut node_id = [0u8; 6];
    node_id.copy_from_slice(&Uuid::new_v4().as_bytes()[..6]);
    // Random node IDs carry the multicast bit so they never collide with a MAC
    node_id[0] |= 0x01;

    format!("{}/{}", log_group_name, Uuid::now_v1(&node_id))
}

/// Merge the config file (if any), command-line overrides and the target.
pub fn build_config(options: &RunOptions) -> Result<Config, ConfigError> {
    let mut config = match resolve_config_path(options.config_path.as_deref()) {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(&path)?
        }
        None => Config::default(),
    };

    if let Some(max_items) = options.max_items {
        config.batch.max_items = max_items;
    }
    if let Some(max_bytes) = options.max_bytes {
        config.batch.max_bytes = max_bytes;
    }
    if let Some(max_age) = options.max_age {
        config.batch.max_age = max_age;
    }
    if options.region.is_some() {
        config.aws.region = options.region.clone();
    }
    if options.endpoint_url.is_some() {
        config.aws.endpoint_url = options.endpoint_url.clone();
    }
    config.output.quiet |= options.quiet;

    let log_stream_name = match &options.log_stream_name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => default_stream_name(&options.log_group_name),
    };
    config.target = TargetConfig {
        log_group_name: options.log_group_name.clone(),
        log_stream_name,
    };

    validate_config(&config)?;
    Ok(config)
}

pub async fn run(options: RunOptions) -> Result<RunSummary, RunError> {
    let config = build_config(&options)?;
    let service: Arc<dyn LogService> =
        Arc::new(CloudWatchLogService::from_config(&config.aws).await);

    run_pipeline(&config, service, tokio::io::stdin(), std::io::stdout()).await
}

/// Wire reader, batcher and uploader together and run until `input` ends.
///
/// The reader and batcher run as spawned tasks; bootstrap and uploads happen
/// on the calling task so the cursor never leaves it.
pub async fn run_pipeline<R, W>(
    config: &Config,
    service: Arc<dyn LogService>,
    input: R,
    output: W,
) -> Result<RunSummary, RunError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: Write,
{
    let target = StreamTarget::new(
        config.target.log_group_name.clone(),
        config.target.log_stream_name.clone(),
    );
    info!(stream = %target, "Starting pipeline");

    let (event_tx, event_rx) = create_channel::<LogEvent>(config.pipeline.event_buffer);
    let (batch_tx, batch_rx) = create_channel::<LogBatch>(config.pipeline.batch_buffer);

    let reader = LineReader::new(BufReader::new(input), config.input.max_line_bytes);
    let reader_handle = tokio::spawn(run_reader(reader, event_tx));

    let limits = BatchLimits::from(&config.batch);
    let batcher_handle = tokio::spawn(run_batcher(event_rx, batch_tx, limits));

    let cursor = bootstrap_stream(service.as_ref(), &target).await?;

    let mut uploader = Uploader::new(
        service,
        target,
        cursor,
        RetryPolicy::from(&config.upload),
        Mirror::new(output, config.output.quiet),
    );
    let upload = uploader.run(batch_rx).await?;

    let reader = reader_handle.await??;
    let batches = batcher_handle.await??;

    info!(
        lines = reader.lines_read,
        events = upload.events,
        batches = batches,
        "Pipeline shutdown complete"
    );

    Ok(RunSummary {
        reader,
        batches,
        upload,
    })
}
