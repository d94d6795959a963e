//! Listener - 轮询接收器、去抖、触发通知、管理进程生命周期
//!
//! 状态流转：
//! ```text
//! Starting → Polling → (Triggering → CoolingDown → Polling)* → Stopping(Clean | Faulted)
//! ```
//!
//! 单任务协作式调度：投递（含全部重试）期间不轮询，冷却期间也不轮询。
//! 所有等待都会响应 shutdown token；接收器在任何退出路径上都只释放一次。

use crate::config::{ExhaustedPolicy, Settings};
use crate::debounce::DebounceFilter;
use crate::liveness::{LivenessEvent, LivenessReporter};
use crate::notification::{DeliveryOutcome, NotificationSender};
use crate::receiver::SignalDecoder;
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Listener 所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Starting,
    Polling,
    Triggering,
    CoolingDown,
    Stopping,
}

/// 运行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 收到中断信号，正常退出
    Clean,
    /// 未处理的故障
    Faulted(String),
}

impl RunOutcome {
    /// 进程退出码
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Clean => 0,
            RunOutcome::Faulted(_) => 1,
        }
    }
}

/// 门铃监听器
pub struct Listener<D: SignalDecoder> {
    settings: Arc<Settings>,
    decoder: D,
    sender: NotificationSender,
    liveness: Arc<dyn LivenessReporter>,
    debounce: DebounceFilter,
    shutdown: CancellationToken,
    state: ListenerState,
}

impl<D: SignalDecoder> Listener<D> {
    pub fn new(
        settings: Arc<Settings>,
        decoder: D,
        sender: NotificationSender,
        liveness: Arc<dyn LivenessReporter>,
        shutdown: CancellationToken,
    ) -> Self {
        let debounce = DebounceFilter::new(settings.doorbell_code.clone());
        Self {
            settings,
            decoder,
            sender,
            liveness,
            debounce,
            shutdown,
            state: ListenerState::Starting,
        }
    }

    fn transition(&mut self, next: ListenerState) {
        if self.state != next {
            trace!(from = ?self.state, to = ?next, "Listener state changed");
            self.state = next;
        }
    }

    /// 运行直到收到中断或发生故障
    pub async fn run(mut self) -> RunOutcome {
        let result = match self.decoder.enable_rx().await {
            Ok(()) => {
                info!(
                    gpio_pin = self.settings.gpio_pin,
                    code = %self.settings.doorbell_code,
                    "Listening on GPIO {}",
                    self.settings.gpio_pin
                );
                self.liveness.report(LivenessEvent::Ready);
                self.poll_loop().await
            }
            Err(e) => Err(e.context("Failed to enable receiver")),
        };

        self.transition(ListenerState::Stopping);
        let outcome = match result {
            Ok(()) => {
                info!("Received interrupt. Quitting.");
                self.liveness.report(LivenessEvent::Stopping);
                RunOutcome::Clean
            }
            Err(e) => {
                error!(error = ?e, "Unhandled failure during execution");
                let reason = format!("{:#}", e);
                self.liveness.report(LivenessEvent::ErrorStatus(reason.clone()));
                RunOutcome::Faulted(reason)
            }
        };

        self.decoder.cleanup().await;
        outcome
    }

    /// 轮询直到中断（`Ok`）或故障（`Err`）
    async fn poll_loop(&mut self) -> Result<()> {
        loop {
            self.transition(ListenerState::Polling);
            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            if let Some(event) = self.decoder.latest()? {
                let verdict = self.debounce.observe(&event);
                if verdict.is_new_event {
                    debug!(
                        code = %event.code_bits,
                        pulse_length = event.pulse_length_micros,
                        protocol = event.protocol_id,
                        "Received code {} (pulselen {}; proto {})",
                        event.code_bits,
                        event.pulse_length_micros,
                        event.protocol_id
                    );
                }

                if verdict.should_notify() && !self.trigger().await? {
                    return Ok(());
                }
            }

            self.liveness.report(LivenessEvent::Alive);
            if !self.pause(self.settings.poll_interval).await {
                return Ok(());
            }
        }
    }

    /// 投递通知并进入冷却；返回 false 表示收到中断
    async fn trigger(&mut self) -> Result<bool> {
        self.transition(ListenerState::Triggering);
        info!("Received valid code. Notifying now.");

        match self.sender.send(&self.shutdown).await {
            DeliveryOutcome::Delivered { attempts } => {
                debug!(attempts, "Notification sent");
            }
            DeliveryOutcome::RetriesExhausted {
                attempts,
                last_failure,
            } => match self.settings.on_retries_exhausted {
                ExhaustedPolicy::Exit => {
                    bail!(
                        "notification retries exhausted after {} attempts: {}",
                        attempts,
                        last_failure
                    );
                }
                ExhaustedPolicy::KeepListening => {
                    error!(
                        attempts,
                        last_failure = %last_failure,
                        "Notification missed, continuing to listen"
                    );
                }
            },
            DeliveryOutcome::Interrupted { attempts } => {
                debug!(attempts, "Delivery interrupted");
                return Ok(false);
            }
        }

        self.liveness.report(LivenessEvent::Alive);
        self.transition(ListenerState::CoolingDown);
        debug!(
            "Going to sleep for {} seconds",
            self.settings.sleep_notifier.as_secs()
        );
        Ok(self.pause(self.settings.sleep_notifier).await)
    }

    /// 可被中断的等待；返回 false 表示收到中断
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
