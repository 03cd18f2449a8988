//! 驱动层错误类型定义

use kondo_protocol::{ParamKind, ProtocolError};
use kondo_serial::LinkError;
use thiserror::Error;

/// 单次事务错误
#[derive(Error, Debug)]
pub enum TransactionError {
    /// 链路错误（超时、读写失败、链路已关闭）
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 帧编码或应答解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 应答格式正确，但内容与命令语义不符（如 Hold 时舵机没有报告位置）
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl TransactionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransactionError::Link(e) if e.is_timeout())
    }
}

/// 配置错误，只影响出错的 actuator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Joint '{joint}': min_angle {min} must be less than max_angle {max}")]
    InvalidAngleBounds { joint: String, min: f64, max: f64 },

    /// 同一链路上舵机 ID 重复
    #[error("Servo id {id} is used by more than one actuator")]
    DuplicateId { id: u8 },

    /// actuator 的舵机 ID 必须在 1-31
    #[error("Joint '{joint}': servo id {id} out of range 1-31")]
    InvalidServoId { joint: String, id: u8 },

    #[error("Joint '{joint}': {param} value {value} out of range 0-127")]
    InvalidParameter {
        joint: String,
        param: ParamKind,
        value: u8,
    },
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 链路打开失败（启动阶段致命）
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Transaction failed: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 按名称/ID/序号找不到 actuator
    #[error("Unknown joint: {0}")]
    UnknownJoint(String),
}
