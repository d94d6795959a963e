//! 通知发送器 - 有上限的重试投递
//!
//! ## 重试规则
//! 1. 最多尝试 `max_attempts` 次（包含首次）
//! 2. HTTP 200 视为成功，立即返回
//! 3. 其他状态码：记录错误，消耗一次尝试，不等待直接进入下一次
//! 4. 传输失败：记录错误，上报一次心跳，等待 `delay` 后进入下一次
//! 5. 次数耗尽返回 `RetriesExhausted`，由调用方决定是否致命

use super::payload::NotificationPayload;
use super::transport::WebhookTransport;
use crate::liveness::{LivenessEvent, LivenessReporter};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 重试预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// 最大尝试次数（>= 1）
    pub max_attempts: u32,
    /// 传输失败后的等待时间
    pub delay_between_attempts: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_between_attempts: Duration::from_secs(3),
        }
    }
}

/// 单次尝试的失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientFailure {
    /// 服务端返回非 200
    Rejected { status: u16 },
    /// 连接级失败
    Transport(String),
}

impl fmt::Display for TransientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientFailure::Rejected { status } => write!(f, "webhook responded with status {}", status),
            TransientFailure::Transport(message) => write!(f, "transport failure: {}", message),
        }
    }
}

/// 投递结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 收到 200
    Delivered { attempts: u32 },
    /// 次数耗尽
    RetriesExhausted {
        attempts: u32,
        last_failure: TransientFailure,
    },
    /// 投递过程中收到退出信号
    Interrupted { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts }
            | DeliveryOutcome::RetriesExhausted { attempts, .. }
            | DeliveryOutcome::Interrupted { attempts } => *attempts,
        }
    }
}

/// 通知发送器
///
/// payload 和 endpoint 在启动时固定。每次调用都是完整的网络往返，
/// 调用两次就会发出两条通知。
pub struct NotificationSender {
    transport: Arc<dyn WebhookTransport>,
    endpoint: String,
    payload: NotificationPayload,
    budget: RetryBudget,
    liveness: Arc<dyn LivenessReporter>,
}

// The endpoint is a webhook secret, so it is left out of Debug output.
impl fmt::Debug for NotificationSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationSender")
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl NotificationSender {
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        endpoint: impl Into<String>,
        payload: NotificationPayload,
        budget: RetryBudget,
        liveness: Arc<dyn LivenessReporter>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            payload,
            budget,
            liveness,
        }
    }

    /// 投递 payload，`shutdown` 被取消时尽快返回 `Interrupted`
    pub async fn send(&self, shutdown: &CancellationToken) -> DeliveryOutcome {
        let max_attempts = self.budget.max_attempts.max(1);
        let mut last_failure = None;

        for attempt in 1..=max_attempts {
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    return DeliveryOutcome::Interrupted { attempts: attempt - 1 };
                }
                result = self.transport.post(&self.endpoint, &self.payload) => result,
            };

            match result {
                Ok(response) if response.is_delivered() => {
                    info!(attempt, max_attempts, "Notification delivered");
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Ok(response) => {
                    error!(
                        attempt,
                        max_attempts,
                        status = response.status,
                        "Webhook rejected notification"
                    );
                    debug!(status = response.status, body = %response.body, "Webhook response body");
                    last_failure = Some(TransientFailure::Rejected {
                        status: response.status,
                    });
                }
                Err(e) => {
                    error!(attempt, max_attempts, error = %e, "Failed to reach webhook");
                    self.liveness.report(LivenessEvent::Alive);
                    last_failure = Some(TransientFailure::Transport(e.to_string()));

                    if attempt < max_attempts {
                        let delay = self.budget.delay_between_attempts;
                        debug!(delay_ms = delay.as_millis() as u64, "Waiting before next attempt");
                        tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => {
                                return DeliveryOutcome::Interrupted { attempts: attempt };
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        let last_failure = last_failure
            .unwrap_or_else(|| TransientFailure::Transport("no attempt was made".to_string()));
        warn!(attempts = max_attempts, last_failure = %last_failure, "Notification retries exhausted");
        DeliveryOutcome::RetriesExhausted {
            attempts: max_attempts,
            last_failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::NoopLiveness;
    use crate::notification::transport::{TransportError, WebhookResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 总是返回固定状态码的传输
    struct FixedStatus {
        status: u16,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WebhookTransport for FixedStatus {
        async fn post(&self, _url: &str, _payload: &NotificationPayload) -> Result<WebhookResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(WebhookResponse {
                status: self.status,
                body: String::new(),
            })
        }
    }

    fn sender(status: u16, max_attempts: u32) -> (NotificationSender, Arc<FixedStatus>) {
        let transport = Arc::new(FixedStatus {
            status,
            calls: AtomicUsize::new(0),
        });
        let sender = NotificationSender::new(
            transport.clone(),
            "http://localhost/hook",
            NotificationPayload::new("{}"),
            RetryBudget {
                max_attempts,
                delay_between_attempts: Duration::from_secs(3),
            },
            Arc::new(NoopLiveness),
        );
        (sender, transport)
    }

    #[tokio::test]
    async fn test_first_200_stops_retrying() {
        let (sender, transport) = sender(200, 5);
        let outcome = sender.send(&CancellationToken::new()).await;
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_2xx_is_not_delivered() {
        let (sender, transport) = sender(204, 2);
        let outcome = sender.send(&CancellationToken::new()).await;
        assert!(!outcome.is_delivered());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let (sender, transport) = sender(200, 3);
        let token = CancellationToken::new();
        token.cancel();
        let outcome = sender.send(&token).await;
        assert_eq!(outcome, DeliveryOutcome::Interrupted { attempts: 0 });
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            TransientFailure::Rejected { status: 500 }.to_string(),
            "webhook responded with status 500"
        );
    }
}
