//! # Kondo Protocol
//!
//! Kondo ICS 串行舵机协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 命令字、子命令、标志位、超时等协议常量
//! - `command`: 命令帧构建（编码）
//! - `reply`: 应答帧解析（解码）
//! - `eeprom`: EEPROM 镜像与模式标志位
//! - `units`: 脉宽 ↔ 弧度、电流 ↔ 力矩代理值的换算
//!
//! ## 帧格式
//!
//! ICS 总线为单线半双工，USB 适配器会把发出的每个字节回显到接收端，
//! 因此一次应答 = 发送帧回显 + 舵机响应。帧格式的所有假设都只存在于本 crate，
//! 如果实际硬件与假设不符，只需要修改这里。

pub mod command;
pub mod constants;
pub mod eeprom;
pub mod reply;
pub mod units;

// 重新导出常用类型
pub use command::{Access, Command, Frame, ParamKind, TimeoutClass};
pub use constants::*;
pub use eeprom::{EEPROM_LEN, EepromImage, ModeFlag};
pub use reply::{Reply, ReplyValue, decode};
pub use units::*;

use std::fmt;
use thiserror::Error;

/// 舵机 ID（总线上 5 bit，0-31）
///
/// 线上编码只允许 0-31；驱动层对 actuator 额外要求 1-31。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct ServoId(u8);

impl ServoId {
    /// 最大 ID（5 bit）
    pub const MAX: u8 = 31;

    /// 创建舵机 ID
    ///
    /// # Errors
    /// - `ProtocolError::InvalidValue`: ID 超出 0-31
    pub fn new(id: u8) -> Result<Self, ProtocolError> {
        if id > Self::MAX {
            return Err(ProtocolError::InvalidValue {
                field: "servo_id".to_string(),
                value: id as u32,
            });
        }
        Ok(Self(id))
    }

    /// 获取原始值
    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ServoId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServoId> for u8 {
    fn from(id: ServoId) -> Self {
        id.0
    }
}

impl fmt::Display for ServoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 应答长度不足，或数据字节违反 7 bit 约定
    #[error("Malformed reply: expected {expected} bytes, got {actual}")]
    Malformed { expected: usize, actual: usize },

    /// 应答的命令字/ID/子命令与请求不匹配
    #[error("Reply id mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    IdMismatch { expected: u8, actual: u8 },

    /// 回显与发送帧不一致（本 ICS 变体唯一的完整性校验）
    #[error("Echo check failed at byte {offset}")]
    ChecksumMismatch { offset: usize },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u32 },
}
