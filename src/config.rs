//! 配置模块 - 启动时读取一次 TOML 配置，校验后生成不可变的 `Settings`
//!
//! 配置文件查找顺序：
//! 1. 命令行 `--config <path>`
//! 2. 当前目录 `./config.toml`
//! 3. 用户配置目录 `~/.config/doorbell-notifier/config.toml`

use crate::debounce::MatchCode;
use crate::notification::RetryBudget;
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_GPIO_PIN: u8 = 18;
pub const DEFAULT_DOORBELL_CODE: &str = "11101111";
pub const DEFAULT_RECEIVER_COMMAND: &str = "rpi-rf_receive -g {pin}";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
pub const DEFAULT_PAYLOAD_FILE: &str = "./payload.json";
pub const DEFAULT_SLEEP_NOTIFIER_SEC: u64 = 4;
pub const DEFAULT_RETRY_DELAY_SEC: u64 = 3;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 10;
pub const DEFAULT_LOGLEVEL: &str = "INFO";

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// 原始配置文件
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub hardware: HardwareSection,
    pub notifier: NotifierSection,
    pub logging: LoggingSection,
}

/// `[hardware]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HardwareSection {
    pub gpio_pin: u8,
    pub doorbell_code: String,
    /// 接收命令，`{pin}` 会被替换为 `gpio_pin`
    pub receiver_command: String,
    pub poll_interval_ms: u64,
}

impl Default for HardwareSection {
    fn default() -> Self {
        Self {
            gpio_pin: DEFAULT_GPIO_PIN,
            doorbell_code: DEFAULT_DOORBELL_CODE.to_string(),
            receiver_command: DEFAULT_RECEIVER_COMMAND.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// `[notifier]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierSection {
    /// 必填，无默认值
    pub slack_webhook_url: Option<String>,
    pub payload_file: PathBuf,
    pub sleep_notifier_sec: u64,
    pub retry_delay_sec: u64,
    pub max_attempts: u32,
    pub request_timeout_sec: u64,
    pub exit_on_retries_exhausted: bool,
}

impl Default for NotifierSection {
    fn default() -> Self {
        Self {
            slack_webhook_url: None,
            payload_file: PathBuf::from(DEFAULT_PAYLOAD_FILE),
            sleep_notifier_sec: DEFAULT_SLEEP_NOTIFIER_SEC,
            retry_delay_sec: DEFAULT_RETRY_DELAY_SEC,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout_sec: DEFAULT_REQUEST_TIMEOUT_SEC,
            exit_on_retries_exhausted: false,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub loglevel: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            loglevel: DEFAULT_LOGLEVEL.to_string(),
        }
    }
}

/// 重试次数耗尽后的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedPolicy {
    /// 记录错误，继续监听（默认）
    KeepListening,
    /// 视为致命错误，进程以失败码退出
    Exit,
}

/// 校验后的运行配置，进程生命周期内不变
#[derive(Debug, Clone)]
pub struct Settings {
    pub gpio_pin: u8,
    pub doorbell_code: MatchCode,
    pub receiver_command: String,
    pub poll_interval: Duration,
    pub slack_webhook_url: String,
    pub payload_file: PathBuf,
    pub sleep_notifier: Duration,
    pub retry: RetryBudget,
    pub request_timeout: Duration,
    pub on_retries_exhausted: ExhaustedPolicy,
    pub loglevel: Level,
}

impl Settings {
    /// 读取并校验配置文件
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: ConfigFile = toml::from_str(content).context("Failed to parse TOML")?;
        Self::from_config_file(raw)
    }

    pub fn from_config_file(raw: ConfigFile) -> Result<Self> {
        let ConfigFile {
            hardware,
            notifier,
            logging,
        } = raw;

        let doorbell_code = MatchCode::new(hardware.doorbell_code)?;

        if hardware.receiver_command.trim().is_empty() {
            bail!("hardware.receiver_command must not be empty");
        }
        if hardware.poll_interval_ms == 0 {
            bail!("hardware.poll_interval_ms must be greater than 0");
        }

        let slack_webhook_url = notifier
            .slack_webhook_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow!("notifier.slack_webhook_url is required"))?;
        validate_webhook_url(&slack_webhook_url)?;

        if notifier.max_attempts == 0 {
            bail!("notifier.max_attempts must be at least 1");
        }
        if notifier.request_timeout_sec == 0 {
            bail!("notifier.request_timeout_sec must be greater than 0");
        }

        let loglevel = parse_log_level(&logging.loglevel)?;

        Ok(Self {
            gpio_pin: hardware.gpio_pin,
            doorbell_code,
            receiver_command: hardware.receiver_command,
            poll_interval: Duration::from_millis(hardware.poll_interval_ms),
            slack_webhook_url,
            payload_file: notifier.payload_file,
            sleep_notifier: Duration::from_secs(notifier.sleep_notifier_sec),
            retry: RetryBudget {
                max_attempts: notifier.max_attempts,
                delay_between_attempts: Duration::from_secs(notifier.retry_delay_sec),
            },
            request_timeout: Duration::from_secs(notifier.request_timeout_sec),
            on_retries_exhausted: if notifier.exit_on_retries_exhausted {
                ExhaustedPolicy::Exit
            } else {
                ExhaustedPolicy::KeepListening
            },
            loglevel,
        })
    }
}

fn validate_webhook_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .with_context(|| format!("notifier.slack_webhook_url is not a valid URL: {}", url))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => bail!("notifier.slack_webhook_url must be http or https, got {}", other),
    }
}

/// 解析日志级别，兼容 Python logging 的级别名（大小写不敏感）
pub fn parse_log_level(name: &str) -> Result<Level> {
    match name.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" | "FATAL" | "ERROR" => Ok(Level::ERROR),
        "WARNING" | "WARN" => Ok(Level::WARN),
        "INFO" => Ok(Level::INFO),
        "DEBUG" => Ok(Level::DEBUG),
        "TRACE" | "NOTSET" => Ok(Level::TRACE),
        _ => bail!("unknown loglevel {:?}", name),
    }
}

/// `RUST_LOG` 未设置时使用的过滤规则
pub fn log_directive(level: Level) -> String {
    let level = level.to_string().to_ascii_lowercase();
    format!("doorbell_notifier={level},doorbelld={level}")
}

/// 定位配置文件
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }

    if let Some(dir) = dirs::config_dir() {
        let user = dir.join("doorbell-notifier").join(CONFIG_FILE_NAME);
        if user.exists() {
            return Ok(user);
        }
    }

    bail!(
        "No config file found: pass --config or create ./{} or ~/.config/doorbell-notifier/{}",
        CONFIG_FILE_NAME,
        CONFIG_FILE_NAME
    )
}
