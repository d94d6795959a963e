//! Run 命令 - 启动门铃监听 daemon

use crate::config::Settings;
use crate::liveness::{LivenessEvent, LivenessReporter, SystemdNotifier};
use crate::listener::{Listener, RunOutcome};
use crate::notification::{NotificationPayload, NotificationSender, ReqwestTransport};
use crate::receiver::CommandReceiver;
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 根据配置构造发送器（读取 payload、创建 HTTP 客户端）
pub fn build_sender(settings: &Settings, liveness: Arc<dyn LivenessReporter>) -> Result<NotificationSender> {
    let payload = NotificationPayload::load(&settings.payload_file)?;
    let transport = ReqwestTransport::new(settings.request_timeout)?;

    Ok(NotificationSender::new(
        Arc::new(transport),
        settings.slack_webhook_url.clone(),
        payload,
        settings.retry,
        liveness,
    ))
}

/// 处理 run 命令
pub async fn handle_run(settings: Arc<Settings>) -> RunOutcome {
    let liveness: Arc<dyn LivenessReporter> = Arc::new(SystemdNotifier::new());
    if SystemdNotifier::is_supervised() {
        info!("Running under systemd supervision");
    }

    let startup = build_sender(&settings, liveness.clone()).and_then(|sender| {
        let receiver = CommandReceiver::new(&settings.receiver_command, settings.gpio_pin)?;
        Ok((sender, receiver))
    });

    let (sender, receiver) = match startup {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = ?e, "Startup failed");
            let reason = format!("{:#}", e);
            liveness.report(LivenessEvent::ErrorStatus(reason.clone()));
            return RunOutcome::Faulted(reason);
        }
    };

    let shutdown = shutdown_on_signal();
    Listener::new(settings, receiver, sender, liveness, shutdown)
        .run()
        .await
}

/// 返回一个在 SIGINT / SIGTERM 时被取消的 token
pub fn shutdown_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });
    token
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, only process kill will stop the daemon");
        std::future::pending::<()>().await;
    }
}
