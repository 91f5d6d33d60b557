//! Invalid configuration -> the daemon refuses to build.

use std::io::Write;

use skywatch_daemon::daemon::Daemon;

use crate::helpers::config::*;

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
    file.write_all(content.as_bytes())
        .expect("should write config");
    file
}

#[tokio::test]
async fn test_e2e_missing_config_file() {
    let result = Daemon::build(std::path::Path::new("/nonexistent/skywatch.toml")).await;

    let err = result.err().expect("missing file must fail");
    assert!(err.to_string().contains("failed to load config"), "got: {}", err);
}

#[tokio::test]
async fn test_e2e_unparsable_config_file() {
    let file = config_file("[scan\nfetch_timeout_secs = ");

    let result = Daemon::build(file.path()).await;

    assert!(result.is_err(), "broken TOML must fail");
}

#[tokio::test]
async fn test_e2e_unknown_provider_section() {
    let file = config_file("[providers.oracle]\ninventory_path = \"/tmp/oracle.json\"\n");

    let result = Daemon::build(file.path()).await;

    let err = result.err().expect("unknown provider must fail");
    assert!(err.to_string().contains("oracle"), "got: {}", err);
}

#[tokio::test]
async fn test_e2e_job_timeout_shorter_than_fetch_timeout() {
    let (mut config, _dir) = TestConfigBuilder::new().build();
    config.scan.fetch_timeout_secs = 30;
    config.scan.job_timeout_secs = 10;

    let result = Daemon::build_from_config(config).await;

    assert!(result.is_err(), "job timeout below fetch timeout must fail");
}

#[tokio::test]
async fn test_e2e_valid_config_file_builds() {
    let file = config_file(
        r#"
[general]
log_level = "debug"

[scan]
fetch_timeout_secs = 5
job_timeout_secs = 20
"#,
    );

    let mut daemon = Daemon::build(file.path())
        .await
        .expect("valid config should build");

    assert_eq!(daemon.config().scan.job_timeout_secs, 20);
    assert_eq!(daemon.config().general.log_level, "debug");

    daemon.shutdown().await;
}
