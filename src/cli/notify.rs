//! Notify 命令 - 不启动接收器，直接投递一次 payload（用于验证 webhook）

use super::run::{build_sender, shutdown_on_signal};
use crate::config::Settings;
use crate::liveness::NoopLiveness;
use crate::notification::DeliveryOutcome;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// 处理 notify 命令
pub async fn handle_notify(settings: &Settings) -> Result<DeliveryOutcome> {
    let sender = build_sender(settings, Arc::new(NoopLiveness))?;
    let shutdown = shutdown_on_signal();

    info!(max_attempts = settings.retry.max_attempts, "Sending test notification");
    Ok(sender.send(&shutdown).await)
}
