//! 集成测试共用的 fake 实现

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use doorbell_notifier::{
    LivenessEvent, LivenessReporter, NotificationPayload, ReceivedEvent, Settings, SignalDecoder,
    TransportError, WebhookResponse, WebhookTransport,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const WEBHOOK_URL: &str = "http://localhost:9999/hook";
pub const MATCH: &str = "11101111";

/// 构造测试配置，`extra` 追加到 `[notifier]` 段
pub fn settings_with(notifier_extra: &str) -> Arc<Settings> {
    let content = format!(
        "[notifier]\nslack_webhook_url = \"{}\"\n{}",
        WEBHOOK_URL, notifier_extra
    );
    Arc::new(Settings::from_toml_str(&content).unwrap())
}

pub fn settings() -> Arc<Settings> {
    settings_with("")
}

pub fn event(bits: &str, timestamp: u64) -> ReceivedEvent {
    ReceivedEvent {
        code_bits: bits.to_string(),
        pulse_length_micros: 350,
        protocol_id: 1,
        timestamp,
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// 解码器的可观察状态
#[derive(Debug, Default)]
pub struct DecoderLog {
    pub enable_calls: usize,
    pub cleanup_calls: usize,
    pub polls: Vec<Instant>,
}

/// 按时间线回放事件的解码器
///
/// `latest()` 返回时间线上最后一个已"到达"的事件，模拟驱动在没有新传输时
/// 重复返回同一事件。到达 `stop_after` 时取消 shutdown token（或返回错误）。
pub struct TimelineDecoder {
    timeline: Vec<(Duration, ReceivedEvent)>,
    start: Option<Instant>,
    stop_after: Duration,
    shutdown: CancellationToken,
    fail_enable: bool,
    fail_at: Option<Duration>,
    pub log: Arc<Mutex<DecoderLog>>,
}

impl TimelineDecoder {
    pub fn new(timeline: Vec<(Duration, ReceivedEvent)>, stop_after: Duration, shutdown: CancellationToken) -> Self {
        Self {
            timeline,
            start: None,
            stop_after,
            shutdown,
            fail_enable: false,
            fail_at: None,
            log: Arc::new(Mutex::new(DecoderLog::default())),
        }
    }

    pub fn failing_enable(mut self) -> Self {
        self.fail_enable = true;
        self
    }

    pub fn failing_at(mut self, at: Duration) -> Self {
        self.fail_at = Some(at);
        self
    }

    pub fn log(&self) -> Arc<Mutex<DecoderLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl SignalDecoder for TimelineDecoder {
    async fn enable_rx(&mut self) -> Result<()> {
        self.log.lock().unwrap().enable_calls += 1;
        if self.fail_enable {
            bail!("GPIO busy");
        }
        self.start = Some(Instant::now());
        Ok(())
    }

    fn latest(&mut self) -> Result<Option<ReceivedEvent>> {
        let now = Instant::now();
        self.log.lock().unwrap().polls.push(now);

        let elapsed = now - self.start.expect("latest called before enable_rx");
        if let Some(fail_at) = self.fail_at {
            if elapsed >= fail_at {
                bail!("receiver went away");
            }
        }
        if elapsed >= self.stop_after {
            self.shutdown.cancel();
        }

        Ok(self
            .timeline
            .iter()
            .filter(|(at, _)| *at <= elapsed)
            .last()
            .map(|(_, event)| event.clone()))
    }

    async fn cleanup(&mut self) {
        self.log.lock().unwrap().cleanup_calls += 1;
    }
}

// ============================================================================
// Transport
// ============================================================================

/// 按顺序返回预设结果的传输；预设用完后一律返回 200
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<u16, String>>>,
    pub attempts: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<u16, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            attempts: Mutex::new(Vec::new()),
        })
    }

    pub fn always(status: u16) -> Arc<Self> {
        Self::new(vec![Ok(status); 64])
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookTransport for ScriptedTransport {
    async fn post(&self, _url: &str, _payload: &NotificationPayload) -> Result<WebhookResponse, TransportError> {
        self.attempts.lock().unwrap().push(Instant::now());
        match self.script.lock().unwrap().pop_front().unwrap_or(Ok(200)) {
            Ok(status) => Ok(WebhookResponse {
                status,
                body: String::new(),
            }),
            Err(message) => Err(TransportError::Connect(message)),
        }
    }
}

// ============================================================================
// Liveness
// ============================================================================

#[derive(Default)]
pub struct RecordingLiveness {
    pub events: Mutex<Vec<LivenessEvent>>,
}

impl RecordingLiveness {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LivenessEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &LivenessEvent) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }
}

impl LivenessReporter for RecordingLiveness {
    fn report(&self, event: LivenessEvent) {
        self.events.lock().unwrap().push(event);
    }
}
