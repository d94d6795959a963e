//! 去抖过滤器 - 同一次按键只触发一次通知
//!
//! 硬件在信号稳定前会重复上报同一次传输，驱动也会在没有新数据时
//! 反复返回同一个事件。这里只比较时间戳：时间戳未变即视为"没有新事件"。
//! 触发后的冷却期由 Listener 通过暂停轮询实现，不在这里处理。

use crate::receiver::ReceivedEvent;
use anyhow::{bail, Result};
use std::fmt;

/// 门铃码（只含 '0' / '1' 的非空字符串）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCode(String);

impl MatchCode {
    pub fn new(bits: impl Into<String>) -> Result<Self> {
        let bits = bits.into();
        if bits.is_empty() {
            bail!("doorbell_code must not be empty");
        }
        if let Some(c) = bits.chars().find(|c| *c != '0' && *c != '1') {
            bail!("doorbell_code must be a bitstring, found {:?} in {:?}", c, bits);
        }
        Ok(Self(bits))
    }

    /// 精确字符串比较，不做容错
    pub fn matches(&self, code_bits: &str) -> bool {
        self.0 == code_bits
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 去抖状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebounceState {
    pub last_seen_timestamp: Option<u64>,
}

/// 单次观测的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub is_new_event: bool,
    pub is_match: bool,
}

impl Verdict {
    /// 新事件且码值匹配时才触发通知
    pub fn should_notify(&self) -> bool {
        self.is_new_event && self.is_match
    }
}

/// 去抖过滤器
#[derive(Debug, Clone)]
pub struct DebounceFilter {
    code: MatchCode,
    state: DebounceState,
}

impl DebounceFilter {
    pub fn new(code: MatchCode) -> Self {
        Self {
            code,
            state: DebounceState::default(),
        }
    }

    /// 观测一个事件
    ///
    /// 新事件无论是否匹配都会更新 `last_seen_timestamp`，
    /// 因此不匹配的传输在后续轮询中也不会被重复评估。
    pub fn observe(&mut self, event: &ReceivedEvent) -> Verdict {
        if self.state.last_seen_timestamp == Some(event.timestamp) {
            return Verdict {
                is_new_event: false,
                is_match: false,
            };
        }

        self.state.last_seen_timestamp = Some(event.timestamp);
        Verdict {
            is_new_event: true,
            is_match: self.code.matches(&event.code_bits),
        }
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    pub fn code(&self) -> &MatchCode {
        &self.code
    }
}
