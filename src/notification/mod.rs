//! 通知投递 - payload、传输层与带重试的发送器

pub mod payload;
pub mod sender;
pub mod transport;

pub use payload::NotificationPayload;
pub use sender::{DeliveryOutcome, NotificationSender, RetryBudget, TransientFailure};
pub use transport::{ReqwestTransport, TransportError, WebhookResponse, WebhookTransport};
