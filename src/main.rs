//! Doorbell Notifier daemon
//!
//! 监听 433MHz 接收器，检测到门铃码后推送 Slack 通知

use anyhow::Result;
use clap::{Parser, Subcommand};
use doorbell_notifier::{
    cli,
    config::{log_directive, resolve_config_path},
    LivenessEvent, LivenessReporter, Settings, SystemdNotifier,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "doorbelld")]
#[command(about = "Doorbell Notifier - 监听门铃射频信号并推送 Slack 通知")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ./config.toml 或 ~/.config/doorbell-notifier/config.toml）
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动监听 daemon（默认）
    Run,
    /// 校验配置和 payload 文件
    Check {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 立即发送一次通知，用于验证 webhook
    Notify,
}

/// 初始化 tracing 日志系统
///
/// RUST_LOG 优先，否则使用配置文件中的 loglevel
fn init_tracing(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directive(level)));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

fn load_settings(explicit: Option<&Path>) -> Result<(PathBuf, Settings)> {
    let path = resolve_config_path(explicit)?;
    let settings = Settings::load(&path)?;
    Ok((path, settings))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Cli::parse();
    let command = args.command.unwrap_or(Commands::Run);

    let (config_path, settings) = match load_settings(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            init_tracing(Level::INFO);
            error!(error = ?e, "Failed to load configuration");
            if matches!(command, Commands::Run) {
                SystemdNotifier::new().report(LivenessEvent::ErrorStatus(format!("{:#}", e)));
            }
            return ExitCode::FAILURE;
        }
    };

    init_tracing(settings.loglevel);
    info!(config = %config_path.display(), "Configuration loaded");

    match command {
        Commands::Run => {
            let outcome = cli::handle_run(Arc::new(settings)).await;
            ExitCode::from(outcome.exit_code() as u8)
        }
        Commands::Check { json } => match cli::handle_check(&config_path, &settings, json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = ?e, "Configuration check failed");
                ExitCode::FAILURE
            }
        },
        Commands::Notify => match cli::handle_notify(&settings).await {
            Ok(outcome) if outcome.is_delivered() => {
                println!("通知已送达（尝试 {} 次）", outcome.attempts());
                ExitCode::SUCCESS
            }
            Ok(outcome) => {
                eprintln!("通知未送达: {:?}", outcome);
                ExitCode::FAILURE
            }
            Err(e) => {
                error!(error = ?e, "Failed to send notification");
                ExitCode::FAILURE
            }
        },
    }
}
