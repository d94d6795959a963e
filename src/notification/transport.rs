//! Webhook 传输层 - 只负责"把字节发到 URL，拿回状态码或传输错误"

use super::payload::NotificationPayload;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 连接级错误（DNS、TCP、TLS、超时），视为暂时性故障
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

/// 一次 HTTP 往返的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_delivered(&self) -> bool {
        self.status == 200
    }
}

/// Webhook 传输 trait
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, url: &str, payload: &NotificationPayload) -> Result<WebhookResponse, TransportError>;
}

/// 基于 reqwest 的实现
///
/// 以表单字段 `payload` 提交内容（Slack incoming webhook 的格式）。
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post(&self, url: &str, payload: &NotificationPayload) -> Result<WebhookResponse, TransportError> {
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(url)
            .form(&[("payload", payload.as_str())])
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        // 读取响应体失败不算传输失败，状态码已经拿到
        let body = response.text().await.unwrap_or_default();
        debug!(status, elapsed_ms = start.elapsed().as_millis() as u64, "Got response from webhook");

        Ok(WebhookResponse { status, body })
    }
}
