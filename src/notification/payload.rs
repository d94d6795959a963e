//! 通知 payload - 启动时从磁盘读取一次，之后每次投递复用

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// 不可变的通知内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload(Arc<str>);

impl NotificationPayload {
    pub fn new(body: impl Into<Arc<str>>) -> Self {
        Self(body.into())
    }

    /// 从文件加载
    ///
    /// 内容按原样发送；不是合法 JSON 时只给出警告（Slack 会拒绝，但那是投递阶段的错误）。
    pub fn load(path: &Path) -> Result<Self> {
        let body = fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file {}", path.display()))?;

        if serde_json::from_str::<serde_json::Value>(&body).is_err() {
            warn!(path = %path.display(), "Payload file is not valid JSON, sending it verbatim");
        }
        debug!(path = %path.display(), bytes = body.len(), "Payload loaded");

        Ok(Self::new(body))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_reads_file_verbatim() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"text": "Ding dong"}}"#).unwrap();

        let payload = NotificationPayload::load(file.path()).unwrap();
        assert_eq!(payload.as_str(), r#"{"text": "Ding dong"}"#);
    }

    #[test]
    fn test_load_accepts_non_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "plain text").unwrap();

        let payload = NotificationPayload::load(file.path()).unwrap();
        assert_eq!(payload.as_str(), "plain text");
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = NotificationPayload::load(Path::new("/nonexistent/payload.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/payload.json"));
    }

    #[test]
    fn test_clones_share_body() {
        let payload = NotificationPayload::new("abc");
        let clone = payload.clone();
        assert!(std::ptr::eq(payload.as_str(), clone.as_str()));
    }
}
