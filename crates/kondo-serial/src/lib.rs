//! # Kondo Serial Link Layer
//!
//! ICS 总线链路抽象：单线半双工 USB 串口，所有舵机共享。
//!
//! - [`IcsLink`]：字节级 purge / write / read_until 接口
//! - [`SerialLink`]：基于 `serialport` 的 USB 串口实现（按 VID/PID 查找适配器）
//! - [`NullLink`]：永远处于关闭状态的链路，用于全 loopback 驱动
//! - `mock`（feature）：测试用的脚本化链路和舵机总线模拟

use std::time::Duration;
use thiserror::Error;

pub use kondo_protocol::ICS_BAUD;

mod null;
mod serial;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use null::NullLink;
pub use serial::{LinkParams, SerialLink};

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    /// 找不到匹配 VID/PID 的 USB 串口
    #[error("No ICS adapter found (vid 0x{vendor_id:04X}, pid 0x{product_id:04X})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// 打开端口或设置波特率/校验失败
    #[error("Failed to configure serial port: {0}")]
    ConfigureFailed(String),

    #[error("Link is not open")]
    NotOpen,

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// 超时前收到的字节数不足
    #[error("Read timeout after {timeout:?}: expected {expected} bytes, got {received}")]
    Timeout {
        expected: usize,
        received: usize,
        timeout: Duration,
    },
}

impl LinkError {
    /// 启动阶段的致命错误（无法取得总线）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LinkError::DeviceNotFound { .. } | LinkError::ConfigureFailed(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout { .. })
    }
}

/// ICS 总线链路
///
/// 实现者只负责字节搬运；帧格式和"同一时刻只允许一个事务"的约束
/// 由上层事务引擎保证。所有方法在链路关闭后都必须返回 `LinkError::NotOpen`。
pub trait IcsLink {
    /// 丢弃接收缓冲区中的陈旧字节
    fn purge(&mut self) -> Result<(), LinkError>;

    /// 写出完整帧
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// 读取恰好 `n` 个字节
    ///
    /// 在 `timeout` 内收不满 `n` 个字节时返回 `LinkError::Timeout`，不会阻塞超过 `timeout`。
    fn read_until(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, LinkError>;

    /// 关闭链路（幂等）
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// 最近一次错误信息
    fn last_error(&self) -> Option<&str> {
        None
    }
}

impl<L: IcsLink + ?Sized> IcsLink for Box<L> {
    fn purge(&mut self) -> Result<(), LinkError> {
        (**self).purge()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).write(bytes)
    }

    fn read_until(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        (**self).read_until(n, timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn last_error(&self) -> Option<&str> {
        (**self).last_error()
    }
}
