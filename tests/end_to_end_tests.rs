//! End-to-end tests for the stdin -> batcher -> uploader pipeline, run
//! against the in-memory log service.

use cwpipe::cli::run::{run_pipeline, RunError};
use cwpipe::config::types::{Config, TargetConfig};
use cwpipe::service::{LogService, MemoryLogService, ServiceCall, ServiceError};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const GROUP: &str = "app-logs";
const STREAM: &str = "app-logs/host-1";

fn test_config() -> Config {
    let mut config = Config::default();
    config.target = TargetConfig {
        log_group_name: GROUP.to_string(),
        log_stream_name: STREAM.to_string(),
    };
    config.batch.max_age = Duration::from_secs(60);
    config
}

/// Messages carried by each put, in call order
fn put_batches(service: &MemoryLogService) -> Vec<Vec<String>> {
    service
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ServiceCall::PutLogEvents { messages, .. } => Some(messages),
            _ => None,
        })
        .collect()
}

fn mirrored_messages(output: &[u8]) -> Vec<String> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .map(|line| line.rsplit(' ').next().unwrap().to_string())
        .collect()
}

async fn run_with_input(
    config: &Config,
    service: Arc<MemoryLogService>,
    input: &'static [u8],
    output: &mut Vec<u8>,
) -> Result<cwpipe::cli::run::RunSummary, RunError> {
    let service: Arc<dyn LogService> = service;
    run_pipeline(config, service, input, output).await
}

#[tokio::test]
async fn test_empty_lines_are_filtered() {
    let service = Arc::new(MemoryLogService::new());
    let mut output = Vec::new();

    let summary = run_with_input(&test_config(), service.clone(), b"a\n\nb\n", &mut output)
        .await
        .unwrap();

    assert_eq!(put_batches(&service), vec![vec!["a", "b"]]);
    assert_eq!(mirrored_messages(&output), vec!["a", "b"]);
    assert_eq!(summary.reader.empty_lines, 1);
    assert_eq!(summary.upload.events, 2);
}

#[tokio::test]
async fn test_fresh_stream_bootstrap_then_token_chain() {
    let service = Arc::new(MemoryLogService::new());
    let mut config = test_config();
    config.batch.max_items = 1;
    let mut output = Vec::new();

    let summary = run_with_input(&config, service.clone(), b"one\ntwo\nthree\n", &mut output)
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(
        put_batches(&service),
        vec![vec!["one"], vec!["two"], vec!["three"]]
    );
    assert_eq!(
        service.put_tokens(),
        vec![None, Some("t1".to_string()), Some("t2".to_string())]
    );
    assert!(matches!(
        service.calls()[2],
        ServiceCall::CreateLogStream { .. }
    ));
}

#[tokio::test]
async fn test_existing_stream_is_resumed() {
    let service = Arc::new(MemoryLogService::new().with_stream(GROUP, STREAM, Some("t0")));
    let mut output = Vec::new();

    run_with_input(&test_config(), service.clone(), b"resumed\n", &mut output)
        .await
        .unwrap();

    assert_eq!(service.put_tokens(), vec![Some("t0".to_string())]);
    assert!(!service
        .calls()
        .iter()
        .any(|call| matches!(call, ServiceCall::CreateLogStream { .. })));
    assert_eq!(service.messages(GROUP, STREAM), vec!["resumed"]);
}

#[tokio::test]
async fn test_byte_cap_splits_uploads() {
    let service = Arc::new(MemoryLogService::new());
    let mut config = test_config();
    config.batch.max_bytes = 100;
    let mut output = Vec::new();

    // Ten 10-byte messages, each accounted as 36 bytes
    run_with_input(
        &config,
        service.clone(),
        b"message-00\nmessage-01\nmessage-02\nmessage-03\nmessage-04\n\
          message-05\nmessage-06\nmessage-07\nmessage-08\nmessage-09\n",
        &mut output,
    )
    .await
    .unwrap();

    let sizes: Vec<usize> = put_batches(&service).iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 3, 1]);
    assert_eq!(service.messages(GROUP, STREAM).len(), 10);
    assert_eq!(mirrored_messages(&output).len(), 10);
}

#[tokio::test]
async fn test_every_line_uploaded_once_in_order() {
    let service = Arc::new(MemoryLogService::new());
    let mut config = test_config();
    config.batch.max_items = 7;
    config.pipeline.event_buffer = 2;
    let mut output = Vec::new();

    let input: String = (0..100).map(|i| format!("line-{:03}\n", i)).collect();
    let input: &'static [u8] = Box::leak(input.into_bytes().into_boxed_slice());

    run_with_input(&config, service.clone(), input, &mut output)
        .await
        .unwrap();

    let expected: Vec<String> = (0..100).map(|i| format!("line-{:03}", i)).collect();
    assert_eq!(service.messages(GROUP, STREAM), expected);
    assert_eq!(mirrored_messages(&output), expected);
    assert!(put_batches(&service).iter().all(|batch| batch.len() <= 7));
}

#[tokio::test]
async fn test_quiet_suppresses_mirror_only() {
    let service = Arc::new(MemoryLogService::new());
    let mut config = test_config();
    config.output.quiet = true;
    let mut output = Vec::new();

    run_with_input(&config, service.clone(), b"silent\n", &mut output)
        .await
        .unwrap();

    assert!(output.is_empty());
    assert_eq!(service.messages(GROUP, STREAM), vec!["silent"]);
}

#[tokio::test]
async fn test_empty_input_uploads_nothing() {
    let service = Arc::new(MemoryLogService::new());
    let mut output = Vec::new();

    let summary = run_with_input(&test_config(), service.clone(), b"", &mut output)
        .await
        .unwrap();

    assert_eq!(summary.batches, 0);
    assert!(service.put_tokens().is_empty());
    // Bootstrap still ran
    assert!(service.has_stream(GROUP, STREAM));
}

#[tokio::test]
async fn test_stream_creation_failure_aborts_before_upload() {
    let service = Arc::new(MemoryLogService::new());
    service.fail_next_create_stream(ServiceError::Sdk("access denied".to_string()));
    let mut output = Vec::new();

    let err = run_with_input(&test_config(), service.clone(), b"never sent\n", &mut output)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Bootstrap(_)));
    assert!(service.put_tokens().is_empty());
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_upload_failure_is_fatal() {
    let service = Arc::new(MemoryLogService::new());
    service.fail_next_put(ServiceError::Sdk("internal failure".to_string()));
    let mut output = Vec::new();

    let err = run_with_input(&test_config(), service.clone(), b"lost\n", &mut output)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Upload(_)));
    assert!(output.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_age_cap_splits_slow_input() {
    let service = Arc::new(MemoryLogService::new());
    let mut config = test_config();
    config.batch.max_age = Duration::from_secs(1);
    let mut output = Vec::new();

    let (mut writer, reader) = tokio::io::duplex(64);
    let dyn_service: Arc<dyn LogService> = service.clone();

    let feed = async move {
        writer.write_all(b"x\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1200)).await;
        writer.write_all(b"y\n").await.unwrap();
    };

    let (result, ()) = tokio::join!(
        run_pipeline(&config, dyn_service, reader, &mut output),
        feed
    );
    result.unwrap();

    assert_eq!(put_batches(&service), vec![vec!["x"], vec!["y"]]);
    assert_eq!(mirrored_messages(&output), vec!["x", "y"]);
}
