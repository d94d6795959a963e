//! 外部接收命令适配器
//!
//! 启动接收工具（默认 `rpi-rf_receive -g {pin}`），逐行解析其输出：
//!
//! ```text
//! 2024-01-01 12:00:00,000 - [INFO] rpi-rf_receive: 239 [pulselength 350, protocol 1]
//! ```
//!
//! 读取任务只负责更新"最近事件"槽位，轮询与去重由 Listener 完成。

use super::{ReceivedEvent, SignalDecoder};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// 解析一行接收工具输出，返回 (码值, 脉宽, 协议)
pub fn parse_receive_line(line: &str) -> Option<(u64, u32, u32)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(\d+) \[pulselength (\d+), protocol (\d+)\]").expect("receive line pattern")
    });

    let caps = pattern.captures(line)?;
    let code = caps[1].parse().ok()?;
    let pulse_length = caps[2].parse().ok()?;
    let protocol = caps[3].parse().ok()?;
    Some((code, pulse_length, protocol))
}

/// 读取任务与轮询方共享的状态
struct Slot {
    latest: Option<ReceivedEvent>,
    started: Instant,
    last_stamp: u64,
}

impl Slot {
    fn record(&mut self, code: u64, pulse_length: u32, protocol: u32) -> ReceivedEvent {
        // 时间戳严格递增，保证相邻两次传输不会被误判为同一事件
        let elapsed = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        let stamp = elapsed.max(self.last_stamp + 1);
        self.last_stamp = stamp;

        let event = ReceivedEvent::from_code(code, pulse_length, protocol, stamp);
        self.latest = Some(event.clone());
        event
    }
}

type SharedSlot = Arc<Mutex<Slot>>;

fn lock(slot: &SharedSlot) -> std::sync::MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 通过子进程驱动的接收器
pub struct CommandReceiver {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
    slot: SharedSlot,
    readers: Vec<JoinHandle<()>>,
}

impl CommandReceiver {
    /// 创建接收器，命令行中的 `{pin}` 会被替换为 GPIO 编号
    pub fn new(command_line: &str, gpio_pin: u8) -> Result<Self> {
        let expanded = command_line.replace("{pin}", &gpio_pin.to_string());
        let mut parts = expanded.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("receiver command is empty"))?;

        Ok(Self {
            program,
            args: parts.collect(),
            child: None,
            slot: Arc::new(Mutex::new(Slot {
                latest: None,
                started: Instant::now(),
                last_stamp: 0,
            })),
            readers: Vec::new(),
        })
    }

    /// 展开后的命令行（用于日志）
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn spawn_reader<R>(reader: R, slot: SharedSlot, stream: &'static str) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_receive_line(&line) {
                        Some((code, pulse_length, protocol)) => {
                            let event = lock(&slot).record(code, pulse_length, protocol);
                            trace!(stream, code_bits = %event.code_bits, timestamp = event.timestamp, "Decoded transmission");
                        }
                        None => trace!(stream, line = %line, "Ignoring receiver output"),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!(stream, error = %e, "Failed to read receiver output");
                        break;
                    }
                }
            }
            debug!(stream, "Receiver output closed");
        })
    }
}

#[async_trait]
impl SignalDecoder for CommandReceiver {
    async fn enable_rx(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start receiver command `{}`", self.command_line()))?;

        {
            let mut slot = lock(&self.slot);
            slot.started = Instant::now();
            slot.latest = None;
            slot.last_stamp = 0;
        }

        if let Some(stdout) = child.stdout.take() {
            self.readers.push(Self::spawn_reader(stdout, self.slot.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            self.readers.push(Self::spawn_reader(stderr, self.slot.clone(), "stderr"));
        }

        info!(command = %self.command_line(), pid = ?child.id(), "Receiver started");
        self.child = Some(child);
        Ok(())
    }

    fn latest(&mut self) -> Result<Option<ReceivedEvent>> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| anyhow!("receiver is not enabled"))?;

        if let Some(status) = child
            .try_wait()
            .context("Failed to query receiver process")?
        {
            bail!("receiver command exited unexpectedly ({})", status);
        }

        Ok(lock(&self.slot).latest.clone())
    }

    async fn cleanup(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }

        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Err(e) = child.start_kill() {
            debug!(error = %e, "Receiver process already gone");
        }
        match child.wait().await {
            Ok(status) => info!(status = %status, "Receiver stopped"),
            Err(e) => warn!(error = %e, "Failed to reap receiver process"),
        }
    }
}
