//! 应答帧解析
//!
//! 一次应答 = 发送帧的回显 + 舵机响应。响应首字节为命令字清除最高位后的值
//! （位置 `0x00|id`、读取 `0x20|id`、写入 `0x40|id`），ID 命令例外，为 `0xE0|id`。

use crate::command::{Command, ParamKind};
use crate::constants::*;
use crate::eeprom::EepromImage;
use crate::{ProtocolError, ServoId};

/// 解码后的应答值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyValue {
    /// 实际脉宽（舵机未给出位置时为 0）
    Position { pulse: u16 },
    /// 单字节参数（读取值或写入确认值）
    Param { param: ParamKind, value: u8 },
    Eeprom(Box<EepromImage>),
    EepromWritten,
    Id(ServoId),
}

/// 原始应答 + 解码结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    raw: Vec<u8>,
    value: ReplyValue,
}

impl Reply {
    /// 原始字节（含回显）
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn value(&self) -> &ReplyValue {
        &self.value
    }

    pub fn into_value(self) -> ReplyValue {
        self.value
    }

    pub fn pulse(&self) -> Option<u16> {
        match self.value {
            ReplyValue::Position { pulse } => Some(pulse),
            _ => None,
        }
    }

    pub fn param_value(&self) -> Option<u8> {
        match self.value {
            ReplyValue::Param { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn servo_id(&self) -> Option<ServoId> {
        match self.value {
            ReplyValue::Id(id) => Some(id),
            _ => None,
        }
    }

    pub fn eeprom(&self) -> Option<&EepromImage> {
        match &self.value {
            ReplyValue::Eeprom(image) => Some(image),
            _ => None,
        }
    }
}

/// 按请求命令解码应答
///
/// # Errors
/// - `ProtocolError::Malformed`: 长度不足，或数据字节最高位被置位
/// - `ProtocolError::ChecksumMismatch`: 回显与发送帧不一致
/// - `ProtocolError::IdMismatch`: 响应命令字/ID/子命令与请求不一致
pub fn decode(command: &Command, raw: &[u8]) -> Result<Reply, ProtocolError> {
    let expected = command.expected_len();
    if raw.len() < expected {
        return Err(ProtocolError::Malformed {
            expected,
            actual: raw.len(),
        });
    }

    let sent = command.encode()?;
    if let Some(offset) = sent.iter().zip(raw).position(|(tx, echo)| tx != echo) {
        return Err(ProtocolError::ChecksumMismatch { offset });
    }

    let resp = &raw[sent.len()..expected];
    let malformed = || ProtocolError::Malformed {
        expected,
        actual: raw.len(),
    };
    let data = |bytes: &[u8]| -> Result<(), ProtocolError> {
        if bytes.iter().any(|b| b & !ICS_DATA_MASK != 0) {
            Err(malformed())
        } else {
            Ok(())
        }
    };

    let value = match command {
        Command::Position { id, .. } | Command::Hold { id } | Command::Free { id } => {
            expect_byte(resp[0], (ICS_CMD_POS & ICS_DATA_MASK) | id.get())?;
            data(&resp[1..3])?;
            let pulse = ((resp[1] as u16) << 7) | resp[2] as u16;
            ReplyValue::Position { pulse }
        },
        Command::GetParam { id, param } => {
            expect_byte(resp[0], (ICS_CMD_GET & ICS_DATA_MASK) | id.get())?;
            expect_byte(resp[1], (*param).into())?;
            if *param == ParamKind::Eeprom {
                let image = EepromImage::from_bytes(&resp[2..]).map_err(|_| malformed())?;
                ReplyValue::Eeprom(Box::new(image))
            } else {
                data(&resp[2..3])?;
                ReplyValue::Param {
                    param: *param,
                    value: resp[2],
                }
            }
        },
        Command::SetParam { id, param, .. } => {
            expect_byte(resp[0], (ICS_CMD_SET & ICS_DATA_MASK) | id.get())?;
            expect_byte(resp[1], (*param).into())?;
            data(&resp[2..3])?;
            ReplyValue::Param {
                param: *param,
                value: resp[2],
            }
        },
        Command::WriteEeprom { id, .. } => {
            expect_byte(resp[0], (ICS_CMD_SET & ICS_DATA_MASK) | id.get())?;
            expect_byte(resp[1], ParamKind::Eeprom.into())?;
            ReplyValue::EepromWritten
        },
        Command::GetId => {
            if resp[0] & ICS_CMD_MASK != ICS_CMD_ID {
                return Err(ProtocolError::IdMismatch {
                    expected: ICS_CMD_ID,
                    actual: resp[0] & ICS_CMD_MASK,
                });
            }
            ReplyValue::Id(ServoId::new(resp[0] & ICS_ID_MASK)?)
        },
        Command::SetId { id } => {
            expect_byte(resp[0], ICS_CMD_ID | id.get())?;
            ReplyValue::Id(*id)
        },
    };

    Ok(Reply {
        raw: raw.to_vec(),
        value,
    })
}

fn expect_byte(actual: u8, expected: u8) -> Result<(), ProtocolError> {
    if actual != expected {
        return Err(ProtocolError::IdMismatch { expected, actual });
    }
    Ok(())
}
