use super::types::*;
use crate::config::expand_env_vars;
use regex::Regex;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Load a config file. Placeholders of the form `$env{NAME}` are replaced
/// with environment values before parsing.
///
/// The returned config has an empty target; the caller fills it in and
/// then calls [`validate_config`].
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse config from a YAML string. An empty document yields the defaults.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml)?;

    if yaml.trim().is_empty() {
        return Ok(Config::default());
    }

    let config: Config = serde_yaml::from_str(&yaml)?;
    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid");
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}",
        unexpanded_vars.join(", ")
    )))
}

/// Check the fully assembled config, reporting every problem at once.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.target.log_group_name.is_empty() {
        errors.push("log group name cannot be empty".to_string());
    }
    if config.target.log_stream_name.is_empty() {
        errors.push("log stream name cannot be empty".to_string());
    }

    validate_batch(&config.batch, &mut errors);

    if config.input.max_line_bytes == 0 {
        errors.push("input.max_line_bytes must be greater than 0".to_string());
    }
    if config.pipeline.event_buffer == 0 {
        errors.push("pipeline.event_buffer must be greater than 0".to_string());
    }
    if config.pipeline.batch_buffer == 0 {
        errors.push("pipeline.batch_buffer must be greater than 0".to_string());
    }

    if config.upload.max_retries > 0 {
        if config.upload.retry_interval.is_zero() {
            errors.push("upload.retry_interval must be non-zero when retries are enabled".to_string());
        }
        if config.upload.max_backoff < config.upload.retry_interval {
            errors.push(
                "upload.max_backoff must not be shorter than upload.retry_interval".to_string(),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_batch(batch: &BatchConfig, errors: &mut Vec<String>) {
    if batch.max_items == 0 {
        errors.push("batch.max_items must be greater than 0".to_string());
    } else if batch.max_items > MAX_EVENTS_PER_PUT {
        errors.push(format!(
            "batch.max_items must be at most {} (got {})",
            MAX_EVENTS_PER_PUT, batch.max_items
        ));
    }

    if batch.max_bytes == 0 {
        errors.push("batch.max_bytes must be greater than 0".to_string());
    }

    if batch.max_age.is_zero() {
        errors.push("batch.max_age must be greater than 0".to_string());
    }
}
