//! 配置文件 + payload 加载测试

use doorbell_notifier::cli::{build_sender, handle_check, CheckOutput};
use doorbell_notifier::config::resolve_config_path;
use doorbell_notifier::{ExhaustedPolicy, NoopLiveness, NotificationPayload, Settings};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, payload_path: &str) -> std::path::PathBuf {
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[hardware]
gpio_pin = 17
doorbell_code = "101100"

[notifier]
slack_webhook_url = "https://hooks.slack.com/services/T000/B000/XXXX"
payload_file = "{}"
sleep_notifier_sec = 6
exit_on_retries_exhausted = true

[logging]
loglevel = "WARNING"
"#,
            payload_path
        ),
    )
    .unwrap();
    config_path
}

#[test]
fn test_load_config_and_payload_from_disk() {
    // Given: 配置文件和 payload 文件
    let dir = TempDir::new().unwrap();
    let payload_path = dir.path().join("payload.json");
    fs::write(&payload_path, r#"{"text": "Someone is at the door"}"#).unwrap();
    let config_path = write_config(&dir, &payload_path.display().to_string());

    // When
    let settings = Settings::load(&config_path).unwrap();
    let payload = NotificationPayload::load(&settings.payload_file).unwrap();

    // Then
    assert_eq!(settings.gpio_pin, 17);
    assert_eq!(settings.doorbell_code.as_str(), "101100");
    assert_eq!(settings.sleep_notifier, Duration::from_secs(6));
    assert_eq!(settings.on_retries_exhausted, ExhaustedPolicy::Exit);
    assert_eq!(payload.as_str(), r#"{"text": "Someone is at the door"}"#);

    let output = CheckOutput::new(&config_path, &settings, &payload);
    assert_eq!(output.gpio_pin, 17);
    assert_eq!(output.loglevel, "WARN");
    assert!(output.exit_on_retries_exhausted);

    assert!(handle_check(&config_path, &settings, true).is_ok());
}

#[test]
fn test_missing_payload_fails_startup() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    let config_path = write_config(&dir, &missing.display().to_string());
    let settings = Settings::load(&config_path).unwrap();

    let err = build_sender(&settings, Arc::new(NoopLiveness)).unwrap_err();
    assert!(format!("{:#}", err).contains("missing.json"));
}

#[test]
fn test_invalid_config_names_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[hardware]\ndoorbell_code = \"abc\"\n").unwrap();

    let err = Settings::load(&config_path).unwrap_err();
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_explicit_config_path_wins() {
    let dir = TempDir::new().unwrap();
    let explicit = dir.path().join("custom.toml");
    assert_eq!(resolve_config_path(Some(&explicit)).unwrap(), explicit);
}
