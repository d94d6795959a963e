//! Check 命令 - 校验配置和 payload，打印生效的配置

use crate::config::{ExhaustedPolicy, Settings};
use crate::notification::NotificationPayload;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

/// Check 命令输出（webhook URL 含密钥，只输出 host）
#[derive(Debug, Serialize)]
pub struct CheckOutput {
    pub config_path: String,
    pub gpio_pin: u8,
    pub doorbell_code: String,
    pub receiver_command: String,
    pub poll_interval_ms: u64,
    pub webhook_host: String,
    pub payload_file: String,
    pub payload_bytes: usize,
    pub sleep_notifier_sec: u64,
    pub retry_delay_sec: u64,
    pub max_attempts: u32,
    pub request_timeout_sec: u64,
    pub exit_on_retries_exhausted: bool,
    pub loglevel: String,
}

impl CheckOutput {
    pub fn new(config_path: &Path, settings: &Settings, payload: &NotificationPayload) -> Self {
        let webhook_host = reqwest::Url::parse(&settings.slack_webhook_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        Self {
            config_path: config_path.display().to_string(),
            gpio_pin: settings.gpio_pin,
            doorbell_code: settings.doorbell_code.to_string(),
            receiver_command: settings
                .receiver_command
                .replace("{pin}", &settings.gpio_pin.to_string()),
            poll_interval_ms: settings.poll_interval.as_millis() as u64,
            webhook_host,
            payload_file: settings.payload_file.display().to_string(),
            payload_bytes: payload.len(),
            sleep_notifier_sec: settings.sleep_notifier.as_secs(),
            retry_delay_sec: settings.retry.delay_between_attempts.as_secs(),
            max_attempts: settings.retry.max_attempts,
            request_timeout_sec: settings.request_timeout.as_secs(),
            exit_on_retries_exhausted: settings.on_retries_exhausted == ExhaustedPolicy::Exit,
            loglevel: settings.loglevel.to_string(),
        }
    }
}

/// 处理 check 命令
pub fn handle_check(config_path: &Path, settings: &Settings, json: bool) -> Result<()> {
    let payload = NotificationPayload::load(&settings.payload_file)?;
    let output = CheckOutput::new(config_path, settings, &payload);

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("配置有效: {}", output.config_path);
        println!("  GPIO: {}", output.gpio_pin);
        println!("  门铃码: {}", output.doorbell_code);
        println!("  接收命令: {}", output.receiver_command);
        println!("  Webhook: {}", output.webhook_host);
        println!("  Payload: {} ({} 字节)", output.payload_file, output.payload_bytes);
        println!("  冷却: {}秒", output.sleep_notifier_sec);
        println!(
            "  重试: 最多 {} 次，间隔 {}秒",
            output.max_attempts, output.retry_delay_sec
        );
        println!(
            "  重试耗尽后: {}",
            if output.exit_on_retries_exhausted { "退出" } else { "继续监听" }
        );
    }
    Ok(())
}
