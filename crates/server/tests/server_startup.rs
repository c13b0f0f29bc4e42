mod common;

use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use common::{minimal_config, write_config, TestServer};

async fn run_to_exit(config_path: &std::path::Path) -> std::process::Output {
    timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_discshelf"))
            .env("DISCSHELF_CONFIG", config_path)
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command")
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start().await;

    let response = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    server.stop().await;
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let server = TestServer::start().await;

    let json: serde_json::Value = server
        .client
        .get(server.url("/config"))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");

    assert_eq!(json["server"]["port"], server.port);
    assert_eq!(json["orchestrator"]["enabled"], false);
    assert_eq!(json["orchestrator"]["auto_approve_threshold"], 0.85);
    assert_eq!(json["tmdb_configured"], false);
    assert_eq!(json["notifications_configured"], false);
    assert!(json.get("tmdb").is_none());

    server.stop().await;
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::start().await;

    let response = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body = response.text().await.unwrap();
    assert!(body.contains("discshelf_jobs_by_status"));
    assert!(body.contains("discshelf_orchestrator_running 0"));

    server.stop().await;
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = run_to_exit(std::path::Path::new("/nonexistent/config.toml")).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_library_section_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(
        dir.path(),
        r#"
[server]
port = 8080

[workspace]
root = "/tmp/discshelf"
"#,
    );

    let result = run_to_exit(&config_path).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_threshold_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let config = format!(
        "{}\n[orchestrator]\nauto_approve_threshold = 1.5\n",
        minimal_config(8080, dir.path())
    );
    let config_path = write_config(dir.path(), &config);

    let result = run_to_exit(&config_path).await;
    assert!(!result.status.success());
}
