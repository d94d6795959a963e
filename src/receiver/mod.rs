//! 射频接收器抽象层
//!
//! 接收器驱动本身是外部组件：它持续采样 GPIO 输入并解码 PWM 信号。
//! 这里只定义 Listener 消费的部分：最新解码事件 + 启动/清理钩子。

pub mod command;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use command::{parse_receive_line, CommandReceiver};

/// 一次解码观测的不可变快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedEvent {
    /// 码值的二进制字符串（仅含 '0' / '1'）
    pub code_bits: String,
    /// 脉冲宽度（微秒）
    pub pulse_length_micros: u32,
    /// 协议编号
    pub protocol_id: u32,
    /// 接收时间戳（单调递增，单位微秒），只用于判断是否为新事件
    pub timestamp: u64,
}

impl ReceivedEvent {
    /// 从十进制码值构造事件，码值渲染为二进制字符串
    pub fn from_code(code: u64, pulse_length_micros: u32, protocol_id: u32, timestamp: u64) -> Self {
        Self {
            code_bits: format!("{:b}", code),
            pulse_length_micros,
            protocol_id,
            timestamp,
        }
    }
}

/// 信号解码器（接收器驱动的消费端接口）
///
/// `latest` 在没有新传输时会重复返回同一个事件（时间戳不变），
/// 去重由调用方负责。
#[async_trait]
pub trait SignalDecoder: Send {
    /// 打开接收器并进入接收模式
    async fn enable_rx(&mut self) -> Result<()>;

    /// 读取最近一次解码结果；接收器失效时返回错误
    fn latest(&mut self) -> Result<Option<ReceivedEvent>>;

    /// 释放接收器资源
    async fn cleanup(&mut self);
}
