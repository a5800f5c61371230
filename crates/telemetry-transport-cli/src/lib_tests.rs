//! Tests for the telemetry-transport-cli library module.

use super::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

async fn endpoint_returning(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer) -> TransportConfig {
    TransportConfig::new(format!("{}/ingest", server.uri()), "cli-key")
}

fn write_payload(dir: &TempDir, payload: &Value) -> PathBuf {
    let path = dir.path().join("payload.json");
    std::fs::write(&path, payload.to_string()).unwrap();
    path
}

// ============================================================================
// Argument Parsing Tests
// ============================================================================

#[test]
fn test_cli_parsing() {
    let cli = parse(&[
        "telemetry-transport",
        "--log-level",
        "debug",
        "--storage-dir",
        "/tmp/queue",
        "send",
        "--file",
        "event.json",
        "--priority",
        "1",
    ]);

    assert_eq!(cli.log_level, "debug");
    assert_eq!(cli.storage_dir, PathBuf::from("/tmp/queue"));
    match cli.command {
        Commands::Send { file, priority } => {
            assert_eq!(file, Some(PathBuf::from("event.json")));
            assert_eq!(priority, Some(1));
        }
        _ => panic!("Expected Send command"),
    }
}

#[test]
fn test_queue_status_format() {
    let cli = parse(&["telemetry-transport", "queue", "status", "--format", "json"]);

    match cli.command {
        Commands::Queue {
            action: QueueCommands::Status { format },
        } => assert_eq!(format, OutputFormat::Json),
        _ => panic!("Expected Queue Status command"),
    }
}

#[test]
fn test_exit_codes_are_distinct() {
    let errors = [
        CliError::Configuration(ConfigError::FileNotFound {
            path: PathBuf::from("x"),
        }),
        CliError::Transport(TransportError::Destroyed),
        CliError::CommandFailed {
            message: "x".to_string(),
        },
        CliError::InvalidArgument {
            arg: "x".to_string(),
            message: "x".to_string(),
        },
        CliError::Io(std::io::Error::new(std::io::ErrorKind::Other, "x")),
        CliError::Storage(StorageError::Unavailable {
            message: "x".to_string(),
        }),
    ];

    let mut codes: Vec<i32> = errors.iter().map(CliError::exit_code).collect();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), errors.len());
    assert!(codes.iter().all(|code| *code != 0));
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_load_configuration_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.toml");
    std::fs::write(
        &path,
        r#"
endpoint = "https://ingest.example.com/v1/events"
api_key = "file-key"
batch_size = 25
offline_support = false
"#,
    )
    .unwrap();

    let config = load_configuration(Some(&path)).unwrap();

    assert_eq!(config.endpoint, "https://ingest.example.com/v1/events");
    assert_eq!(config.api_key.expose(), "file-key");
    assert_eq!(config.batch_size, 25);
    assert!(!config.offline_support);
    assert_eq!(config.max_retries, 3);
}

#[test]
fn test_load_configuration_missing_file() {
    let result = load_configuration(Some(Path::new("/nonexistent/telemetry.toml")));

    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}

#[tokio::test]
async fn test_config_command_redacts_api_key() {
    let cli = parse(&["telemetry-transport", "config", "--show"]);
    let config = TransportConfig::new("https://ingest.example.com/v1/events", "super-secret");

    let output = execute_command(&cli, config).await.unwrap();

    assert!(!output.contains("super-secret"));
    let rendered: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(rendered["api_key"], "<REDACTED>");
    assert_eq!(rendered["batch_size"], 50);
}

#[tokio::test]
async fn test_config_command_rejects_invalid_config() {
    let cli = parse(&["telemetry-transport", "config"]);

    let result = execute_command(&cli, TransportConfig::default()).await;

    assert!(matches!(result, Err(CliError::Configuration(_))));
}

// ============================================================================
// Command Tests
// ============================================================================

#[tokio::test]
async fn test_send_delivers_payload() {
    let server = endpoint_returning(200).await;
    let dir = TempDir::new().unwrap();
    let file = write_payload(&dir, &json!({"event": "deploy"}));
    let storage_dir = dir.path().join("queue");

    let cli = parse(&[
        "telemetry-transport",
        "--storage-dir",
        storage_dir.to_str().unwrap(),
        "send",
        "--file",
        file.to_str().unwrap(),
    ]);
    let output = execute_command(&cli, config_for(&server)).await.unwrap();

    assert_eq!(output, "Payload sent");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_send_rejects_invalid_json() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("broken.json");
    std::fs::write(&file, "{not json").unwrap();

    let cli = parse(&[
        "telemetry-transport",
        "--storage-dir",
        dir.path().to_str().unwrap(),
        "send",
        "--file",
        file.to_str().unwrap(),
    ]);
    let config = TransportConfig::new("http://127.0.0.1:9/ingest", "k");
    let error = execute_command(&cli, config).await.unwrap_err();

    assert!(matches!(error, CliError::InvalidArgument { .. }));
    assert_eq!(error.exit_code(), 4);
}

#[tokio::test]
async fn test_queued_payload_survives_until_flush() {
    let failing = endpoint_returning(503).await;
    let healthy = endpoint_returning(200).await;
    let dir = TempDir::new().unwrap();
    let file = write_payload(&dir, &json!([{"n": 1}, {"n": 2}]));
    let storage_dir = dir.path().join("queue");
    let storage_arg = storage_dir.to_str().unwrap();

    let send = parse(&[
        "telemetry-transport",
        "--storage-dir",
        storage_arg,
        "send",
        "--file",
        file.to_str().unwrap(),
    ]);
    let output = execute_command(&send, config_for(&failing)).await.unwrap();
    assert_eq!(output, "2 item(s) queued for delivery");

    let status = parse(&[
        "telemetry-transport",
        "--storage-dir",
        storage_arg,
        "queue",
        "status",
        "--format",
        "json",
    ]);
    let output = execute_command(&status, config_for(&healthy)).await.unwrap();
    let report: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(report["size"], 2);
    assert_eq!(report["items"][0]["retry_count"], 1);

    let flush = parse(&["telemetry-transport", "--storage-dir", storage_arg, "flush"]);
    let output = execute_command(&flush, config_for(&healthy)).await.unwrap();
    assert_eq!(
        output,
        "Flushed 1 batch(es): 2 delivered, 0 requeued, 0 dropped, 0 remaining"
    );
}

#[tokio::test]
async fn test_queue_clear() {
    let failing = endpoint_returning(503).await;
    let dir = TempDir::new().unwrap();
    let file = write_payload(&dir, &json!({"n": 1}));
    let storage_dir = dir.path().join("queue");
    let storage_arg = storage_dir.to_str().unwrap();

    let send = parse(&[
        "telemetry-transport",
        "--storage-dir",
        storage_arg,
        "send",
        "--file",
        file.to_str().unwrap(),
    ]);
    execute_command(&send, config_for(&failing)).await.unwrap();

    let clear = parse(&["telemetry-transport", "--storage-dir", storage_arg, "queue", "clear"]);
    let output = execute_command(&clear, config_for(&failing)).await.unwrap();
    assert_eq!(output, "Cleared 1 queued item(s)");

    let status = parse(&["telemetry-transport", "--storage-dir", storage_arg, "queue", "status"]);
    let output = execute_command(&status, config_for(&failing)).await.unwrap();
    assert_eq!(output, "0 item(s) queued");
}

#[tokio::test]
async fn test_queue_commands_need_no_endpoint() {
    let failing = endpoint_returning(503).await;
    let dir = TempDir::new().unwrap();
    let file = write_payload(&dir, &json!({"n": 1}));
    let storage_dir = dir.path().join("queue");
    let storage_arg = storage_dir.to_str().unwrap();

    let send = parse(&[
        "telemetry-transport",
        "--storage-dir",
        storage_arg,
        "send",
        "--file",
        file.to_str().unwrap(),
    ]);
    execute_command(&send, config_for(&failing)).await.unwrap();

    // No endpoint configured at all
    let unconfigured = TransportConfig::default();
    assert!(unconfigured.validate().is_err());

    let status = parse(&["telemetry-transport", "--storage-dir", storage_arg, "queue", "status"]);
    let output = execute_command(&status, unconfigured.clone()).await.unwrap();
    assert!(output.starts_with("1 item(s) queued"), "got {}", output);

    let clear = parse(&["telemetry-transport", "--storage-dir", storage_arg, "queue", "clear"]);
    let output = execute_command(&clear, unconfigured.clone()).await.unwrap();
    assert_eq!(output, "Cleared 1 queued item(s)");

    let output = execute_command(&status, unconfigured).await.unwrap();
    assert_eq!(output, "0 item(s) queued");
}

#[tokio::test]
async fn test_send_with_priority_queues_then_flushes() {
    let server = endpoint_returning(200).await;
    let dir = TempDir::new().unwrap();
    let file = write_payload(&dir, &json!({"alert": true}));

    let cli = parse(&[
        "telemetry-transport",
        "--storage-dir",
        dir.path().join("queue").to_str().unwrap(),
        "send",
        "--file",
        file.to_str().unwrap(),
        "--priority",
        "0",
    ]);
    let output = execute_command(&cli, config_for(&server)).await.unwrap();

    assert_eq!(
        output,
        "Flushed 1 batch(es): 1 delivered, 0 requeued, 0 dropped, 0 remaining"
    );
}
