use clap::Parser;
use cwpipe::cli::run::RunOptions;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cwpipe")]
#[command(about = "Ship lines from stdin to a CloudWatch Logs stream", long_about = None)]
struct Cli {
    /// The name of the log group
    #[arg(long)]
    log_group_name: String,

    /// The name of the log stream (default: <log-group-name>/<uuid>)
    #[arg(long)]
    log_stream_name: Option<String>,

    /// Do not echo uploaded lines to stdout
    #[arg(long)]
    quiet: bool,

    /// YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum events per batch
    #[arg(long)]
    max_items: Option<usize>,

    /// Maximum accounted bytes per batch
    #[arg(long)]
    max_bytes: Option<usize>,

    /// Maximum time a batch stays open, e.g. "1s" or "250ms"
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    max_age: Option<Duration>,

    /// AWS region override
    #[arg(long)]
    region: Option<String>,

    /// CloudWatch Logs endpoint override
    #[arg(long)]
    endpoint_url: Option<String>,
}

impl From<Cli> for RunOptions {
    fn from(cli: Cli) -> Self {
        Self {
            config_path: cli.config,
            log_group_name: cli.log_group_name,
            log_stream_name: cli.log_stream_name,
            quiet: cli.quiet,
            max_items: cli.max_items,
            max_bytes: cli.max_bytes,
            max_age: cli.max_age,
            region: cli.region,
            endpoint_url: cli.endpoint_url,
        }
    }
}

#[tokio::main]
async fn main() {
    // Stdout carries the mirrored events, so diagnostics go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cwpipe=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = cwpipe::cli::run::run(cli.into()).await {
        eprintln!("Error: {}", e);
        // Exit without waiting on the stdin reader, which cannot be cancelled
        std::process::exit(1);
    }
}
