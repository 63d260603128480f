use serde::{Deserialize, Serialize};
use std::time::Duration;

/// CloudWatch refuses PutLogEvents calls with more events than this
pub const MAX_EVENTS_PER_PUT: usize = 10_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Filled from the command line, never from the file
    #[serde(skip)]
    pub target: TargetConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub aws: AwsConfig,
}

/// Where events are sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetConfig {
    pub log_group_name: String,
    pub log_stream_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_max_age", with = "humantime_serde")]
    pub max_age: Duration,
}

fn default_max_items() -> usize {
    1000
}

fn default_max_bytes() -> usize {
    8_000_000
}

fn default_max_age() -> Duration {
    Duration::from_secs(1)
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            max_bytes: default_max_bytes(),
            max_age: default_max_age(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Longer lines are truncated to this many bytes
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_max_line_bytes() -> usize {
    // 256 KiB event limit minus the per-event overhead
    262_118
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_batch_buffer")]
    pub batch_buffer: usize,
}

fn default_event_buffer() -> usize {
    1024
}

fn default_batch_buffer() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
            batch_buffer: default_batch_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 0 keeps the strict behavior: the first failed upload ends the run
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
}

fn default_retry_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(30)
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_interval: default_retry_interval(),
            max_backoff: default_max_backoff(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}
