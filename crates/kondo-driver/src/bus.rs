//! 事务引擎
//!
//! ICS 总线是半双工的，一次事务 = purge → 写命令帧 → 按命令的超时等级读满应答 → 解码。
//! [`Bus`] 用互斥锁保证同一链路上任意时刻只有一个事务在进行；需要连续执行多个事务
//! 而不被其他调用者插入时，使用 [`Bus::lock`] 取得 [`BusSession`]。
//!
//! 引擎本身不做重试，重试策略由调用者决定。

use crate::error::TransactionError;
use crate::metrics::BusMetrics;
use kondo_protocol::{Command, MAX_PULSE, MIN_PULSE, Reply, decode};
use kondo_serial::{IcsLink, LinkError};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// 独占一条链路的事务引擎
pub struct Bus<L> {
    link: Mutex<L>,
    metrics: BusMetrics,
}

impl<L: IcsLink> Bus<L> {
    pub fn new(link: L) -> Self {
        Self {
            link: Mutex::new(link),
            metrics: BusMetrics::new(),
        }
    }

    /// 执行单个事务
    ///
    /// # Errors
    /// - `TransactionError::Link`: 链路关闭、读写失败或超时
    /// - `TransactionError::Protocol`: 编码参数非法或应答校验失败
    pub fn execute(&self, command: &Command) -> Result<Reply, TransactionError> {
        self.lock().execute(command)
    }

    /// 独占总线，直到返回的会话被 drop
    pub fn lock(&self) -> BusSession<'_, L> {
        BusSession {
            link: self.link.lock(),
            metrics: &self.metrics,
        }
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.metrics
    }

    pub fn is_open(&self) -> bool {
        self.link.lock().is_open()
    }

    /// 关闭链路（幂等）
    pub fn close(&self) {
        self.link.lock().close();
    }

    pub fn into_inner(self) -> L {
        self.link.into_inner()
    }
}

/// 持有总线锁的会话
pub struct BusSession<'a, L> {
    link: MutexGuard<'a, L>,
    metrics: &'a BusMetrics,
}

impl<L: IcsLink> BusSession<'_, L> {
    /// 在本会话内执行事务
    ///
    /// `Hold` 由两个事务组成：先发送脱力帧取得当前脉宽，再以该脉宽发送位置帧，
    /// 两者之间总线不会被其他调用者占用。
    pub fn execute(&mut self, command: &Command) -> Result<Reply, TransactionError> {
        match command {
            Command::Hold { id } => {
                let released = self.transact(command)?;
                let pulse = released.pulse().unwrap_or_default();
                if !(MIN_PULSE..=MAX_PULSE).contains(&pulse) {
                    return Err(TransactionError::UnexpectedReply(format!(
                        "servo {id} reported pulse {pulse} while releasing for hold"
                    )));
                }
                debug!("Holding servo {} at pulse {}", id, pulse);
                self.transact(&Command::Position { id: *id, pulse })
            },
            _ => self.transact(command),
        }
    }

    fn transact(&mut self, command: &Command) -> Result<Reply, TransactionError> {
        self.metrics.transactions.fetch_add(1, Ordering::Relaxed);
        let result = self.round_trip(command);
        match &result {
            Ok(_) => {
                self.metrics.completed.fetch_add(1, Ordering::Relaxed);
            },
            Err(TransactionError::Link(LinkError::Timeout { .. })) => {
                self.metrics.timeouts.fetch_add(1, Ordering::Relaxed);
            },
            Err(TransactionError::Link(_)) => {
                self.metrics.link_errors.fetch_add(1, Ordering::Relaxed);
            },
            Err(_) => {
                self.metrics.protocol_errors.fetch_add(1, Ordering::Relaxed);
            },
        }
        result
    }

    fn round_trip(&mut self, command: &Command) -> Result<Reply, TransactionError> {
        let frame = command.encode()?;
        let link = &mut *self.link;

        link.purge()?;
        link.write(&frame)?;
        let raw = link.read_until(command.expected_len(), command.timeout())?;
        trace!("{:?} -> {} bytes", command, raw.len());

        Ok(decode(command, &raw)?)
    }
}
