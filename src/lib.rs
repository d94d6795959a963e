//! Doorbell Notifier - 监听 433MHz 接收器上的门铃码，并通过 Slack webhook 推送通知

pub mod cli;
pub mod config;
pub mod debounce;
pub mod listener;
pub mod liveness;
pub mod notification;
pub mod receiver;

pub use config::{ExhaustedPolicy, Settings};
pub use debounce::{DebounceFilter, DebounceState, MatchCode, Verdict};
pub use listener::{Listener, ListenerState, RunOutcome};
pub use liveness::{LivenessEvent, LivenessReporter, NoopLiveness, SystemdNotifier};
pub use notification::{
    DeliveryOutcome, NotificationPayload, NotificationSender, ReqwestTransport, RetryBudget,
    TransientFailure, TransportError, WebhookResponse, WebhookTransport,
};
pub use receiver::{CommandReceiver, ReceivedEvent, SignalDecoder};
