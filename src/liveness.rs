//! 存活上报 - 向进程管理器（systemd）报告 Ready / Watchdog / Stopping / 错误状态

use sd_notify::NotifyState;
use std::fmt;
use tracing::debug;

/// 存活事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessEvent {
    /// 已进入接收模式
    Ready,
    /// 心跳（watchdog）
    Alive,
    /// 正常退出中
    Stopping,
    /// 故障退出，附带错误描述
    ErrorStatus(String),
}

impl fmt::Display for LivenessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LivenessEvent::Ready => write!(f, "ready"),
            LivenessEvent::Alive => write!(f, "alive"),
            LivenessEvent::Stopping => write!(f, "stopping"),
            LivenessEvent::ErrorStatus(message) => write!(f, "error: {}", message),
        }
    }
}

/// 存活上报 trait
///
/// 上报失败不影响主流程，所以不返回 Result。
pub trait LivenessReporter: Send + Sync {
    fn report(&self, event: LivenessEvent);
}

/// 空实现（测试、一次性命令）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLiveness;

impl LivenessReporter for NoopLiveness {
    fn report(&self, _event: LivenessEvent) {}
}

/// 通过 sd_notify 协议上报给 systemd
///
/// 没有 `NOTIFY_SOCKET` 环境变量时（非 systemd 启动）所有上报均为空操作。
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemdNotifier;

impl SystemdNotifier {
    pub fn new() -> Self {
        Self
    }

    /// 当前进程是否由 systemd 以 Type=notify 启动
    pub fn is_supervised() -> bool {
        std::env::var_os("NOTIFY_SOCKET").is_some()
    }
}

impl LivenessReporter for SystemdNotifier {
    fn report(&self, event: LivenessEvent) {
        let result = match &event {
            LivenessEvent::Ready => sd_notify::notify(false, &[NotifyState::Ready]),
            LivenessEvent::Alive => sd_notify::notify(false, &[NotifyState::Watchdog]),
            LivenessEvent::Stopping => sd_notify::notify(false, &[NotifyState::Stopping]),
            LivenessEvent::ErrorStatus(message) => {
                let status = format!("An exception occurred: {}", message);
                sd_notify::notify(false, &[NotifyState::Status(&status), NotifyState::Errno(1)])
            }
        };

        if let Err(e) = result {
            debug!(event = %event, error = %e, "sd_notify failed");
        }
    }
}
