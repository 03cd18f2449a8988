//! 命令帧构建
//!
//! 命令字节 = 命令类别（高 3 bit）| 舵机 ID（低 5 bit），其后的数据字节
//! 最高位恒为 0（7 bit 数据），以便与命令字节区分。

use crate::constants::*;
use crate::eeprom::{EEPROM_LEN, EepromImage};
use crate::{ProtocolError, ServoId};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use smallvec::SmallVec;
use std::fmt;
use std::time::Duration;

/// 命令帧缓冲区
///
/// 除 EEPROM 写入（66 字节）外，所有命令帧都不超过 4 字节，栈上预留 8 字节。
pub type Frame = SmallVec<[u8; 8]>;

/// 参数子命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ParamKind {
    Eeprom = 0,
    Stretch = 1,
    Speed = 2,
    Current = 3,
    Temperature = 4,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Eeprom => "eeprom",
            ParamKind::Stretch => "stretch",
            ParamKind::Speed => "speed",
            ParamKind::Current => "current",
            ParamKind::Temperature => "temperature",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ParamKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            ParamKind::Eeprom,
            ParamKind::Stretch,
            ParamKind::Speed,
            ParamKind::Current,
            ParamKind::Temperature,
        ]
        .into_iter()
        .find(|p| p.name().eq_ignore_ascii_case(s))
        .ok_or_else(|| ProtocolError::InvalidValue {
            field: format!("parameter '{s}'"),
            value: 0,
        })
    }
}

/// 读写选择子命令
///
/// 参数命令的读写方向由 GET/SET 命令类别表达；ID 命令则显式携带该子命令。
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Access {
    Read = 0,
    Write = 1,
}

/// 超时等级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Position,
    Get,
    Set,
    Id,
    /// 原始接收（不属于任何命令）
    Receive,
}

impl TimeoutClass {
    pub fn duration(self) -> Duration {
        match self {
            TimeoutClass::Position => ICS_POS_TIMEOUT,
            TimeoutClass::Get => ICS_GET_TIMEOUT,
            TimeoutClass::Set => ICS_SET_TIMEOUT,
            TimeoutClass::Id => ICS_ID_TIMEOUT,
            TimeoutClass::Receive => ICS_RX_TIMEOUT,
        }
    }
}

/// ICS 命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 移动到目标脉宽，应答为实际脉宽
    Position { id: ServoId, pulse: u16 },
    /// 脱力后在当前位置重新保持（由事务层补发位置帧）
    Hold { id: ServoId },
    /// 脱力（位置帧，脉宽 0）
    Free { id: ServoId },
    GetParam { id: ServoId, param: ParamKind },
    /// 写入单字节参数（`param` 不能为 `Eeprom`）
    SetParam {
        id: ServoId,
        param: ParamKind,
        value: u8,
    },
    /// 整块写入 EEPROM
    WriteEeprom { id: ServoId, image: Box<EepromImage> },
    /// 读取 ID（总线上只能连接一个舵机）
    GetId,
    /// 写入 ID（总线上只能连接一个舵机）
    SetId { id: ServoId },
}

impl Command {
    /// 目标舵机 ID（`GetId` 没有目标）
    pub fn id(&self) -> Option<ServoId> {
        match self {
            Command::Position { id, .. }
            | Command::Hold { id }
            | Command::Free { id }
            | Command::GetParam { id, .. }
            | Command::SetParam { id, .. }
            | Command::WriteEeprom { id, .. }
            | Command::SetId { id } => Some(*id),
            Command::GetId => None,
        }
    }

    pub fn timeout_class(&self) -> TimeoutClass {
        match self {
            Command::Position { .. } | Command::Hold { .. } | Command::Free { .. } => {
                TimeoutClass::Position
            },
            Command::GetParam { .. } => TimeoutClass::Get,
            Command::SetParam { .. } | Command::WriteEeprom { .. } => TimeoutClass::Set,
            Command::GetId | Command::SetId { .. } => TimeoutClass::Id,
        }
    }

    /// 本命令的应答超时
    pub fn timeout(&self) -> Duration {
        self.timeout_class().duration()
    }

    /// 发送帧长度
    pub fn tx_len(&self) -> usize {
        match self {
            Command::Position { .. } | Command::Hold { .. } | Command::Free { .. } => 3,
            Command::GetParam { .. } => 2,
            Command::SetParam { .. } => 3,
            Command::WriteEeprom { .. } => 2 + EEPROM_LEN,
            Command::GetId | Command::SetId { .. } => 4,
        }
    }

    /// 舵机响应长度（不含回显）
    pub fn response_len(&self) -> usize {
        match self {
            Command::Position { .. } | Command::Hold { .. } | Command::Free { .. } => 3,
            Command::GetParam {
                param: ParamKind::Eeprom,
                ..
            } => 2 + EEPROM_LEN,
            Command::GetParam { .. } => 3,
            Command::SetParam { .. } => 3,
            Command::WriteEeprom { .. } => 2,
            Command::GetId | Command::SetId { .. } => 1,
        }
    }

    /// 一次事务需要读取的总字节数（回显 + 响应）
    pub fn expected_len(&self) -> usize {
        self.tx_len() + self.response_len()
    }

    /// 编码为线上字节
    ///
    /// # Errors
    /// - `ProtocolError::InvalidValue`: 脉宽超出 [3500, 11500]，参数值超出 7 bit，
    ///   或对 `Eeprom` 使用 `SetParam`
    pub fn encode(&self) -> Result<Frame, ProtocolError> {
        let mut frame = Frame::new();
        match self {
            Command::Position { id, pulse } => {
                if !(MIN_PULSE..=MAX_PULSE).contains(pulse) {
                    return Err(ProtocolError::InvalidValue {
                        field: "pulse".to_string(),
                        value: *pulse as u32,
                    });
                }
                push_position(&mut frame, *id, *pulse);
            },
            Command::Hold { id } | Command::Free { id } => {
                push_position(&mut frame, *id, FREE_PULSE);
            },
            Command::GetParam { id, param } => {
                frame.push(ICS_CMD_GET | id.get());
                frame.push((*param).into());
            },
            Command::SetParam { id, param, value } => {
                if *param == ParamKind::Eeprom {
                    return Err(ProtocolError::InvalidValue {
                        field: "set_param(eeprom)".to_string(),
                        value: *value as u32,
                    });
                }
                if *value > MAX_PARAM_VALUE {
                    return Err(ProtocolError::InvalidValue {
                        field: param.name().to_string(),
                        value: *value as u32,
                    });
                }
                frame.push(ICS_CMD_SET | id.get());
                frame.push((*param).into());
                frame.push(*value);
            },
            Command::WriteEeprom { id, image } => {
                frame.push(ICS_CMD_SET | id.get());
                frame.push(ParamKind::Eeprom.into());
                frame.extend_from_slice(image.as_bytes());
            },
            Command::GetId => {
                // 广播 ID（0x1F）+ 三个读子命令
                let read: u8 = Access::Read.into();
                frame.push(ICS_CMD_ID | ICS_ID_MASK);
                frame.extend_from_slice(&[read; 3]);
            },
            Command::SetId { id } => {
                let write: u8 = Access::Write.into();
                frame.push(ICS_CMD_ID | id.get());
                frame.extend_from_slice(&[write; 3]);
            },
        }
        debug_assert_eq!(frame.len(), self.tx_len());
        Ok(frame)
    }
}

fn push_position(frame: &mut Frame, id: ServoId, pulse: u16) {
    frame.push(ICS_CMD_POS | id.get());
    frame.push(((pulse >> 7) as u8) & ICS_DATA_MASK);
    frame.push((pulse as u8) & ICS_DATA_MASK);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ServoId {
        ServoId::new(n).unwrap()
    }

    #[test]
    fn test_param_kind_from_u8() {
        assert_eq!(ParamKind::try_from(0).unwrap(), ParamKind::Eeprom);
        assert_eq!(ParamKind::try_from(3).unwrap(), ParamKind::Current);
        assert!(ParamKind::try_from(5).is_err());
        assert_eq!(u8::from(ParamKind::Temperature), 4);
    }

    #[test]
    fn test_encode_position_center() {
        let frame = Command::Position {
            id: id(1),
            pulse: CNT_PULSE,
        }
        .encode()
        .unwrap();
        // 7500 = 0b11_1010100_1100 -> hi = 7500 >> 7 = 58, lo = 7500 & 0x7F = 76
        assert_eq!(frame.as_slice(), &[0x81, 58, 76]);
    }

    #[test]
    fn test_encode_position_data_bytes_are_7bit() {
        for pulse in [MIN_PULSE, CNT_PULSE, MAX_PULSE] {
            let frame = Command::Position { id: id(31), pulse }.encode().unwrap();
            assert_eq!(frame[0], 0x9F);
            assert!(frame[1] & 0x80 == 0 && frame[2] & 0x80 == 0);
            assert_eq!(((frame[1] as u16) << 7) | frame[2] as u16, pulse);
        }
    }

    #[test]
    fn test_encode_position_out_of_range() {
        let err = Command::Position {
            id: id(1),
            pulse: 3499,
        }
        .encode()
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { value: 3499, .. }));
        assert!(
            Command::Position {
                id: id(1),
                pulse: 11501
            }
            .encode()
            .is_err()
        );
    }

    #[test]
    fn test_encode_free_and_hold() {
        let free = Command::Free { id: id(2) }.encode().unwrap();
        let hold = Command::Hold { id: id(2) }.encode().unwrap();
        assert_eq!(free.as_slice(), &[0x82, 0, 0]);
        assert_eq!(free, hold);
    }

    #[test]
    fn test_encode_get_set_param() {
        let get = Command::GetParam {
            id: id(5),
            param: ParamKind::Current,
        }
        .encode()
        .unwrap();
        assert_eq!(get.as_slice(), &[0xA5, 0x03]);

        let set = Command::SetParam {
            id: id(5),
            param: ParamKind::Speed,
            value: 100,
        }
        .encode()
        .unwrap();
        assert_eq!(set.as_slice(), &[0xC5, 0x02, 100]);
    }

    #[test]
    fn test_encode_set_param_rejects_invalid() {
        assert!(
            Command::SetParam {
                id: id(5),
                param: ParamKind::Speed,
                value: 128,
            }
            .encode()
            .is_err()
        );
        assert!(
            Command::SetParam {
                id: id(5),
                param: ParamKind::Eeprom,
                value: 1,
            }
            .encode()
            .is_err()
        );
    }

    #[test]
    fn test_encode_id_commands() {
        assert_eq!(Command::GetId.encode().unwrap().as_slice(), &[0xFF, 0, 0, 0]);
        assert_eq!(
            Command::SetId { id: id(7) }.encode().unwrap().as_slice(),
            &[0xE7, 1, 1, 1]
        );
    }

    #[test]
    fn test_encode_write_eeprom() {
        let image = EepromImage::from_bytes(&[0x3; EEPROM_LEN]).unwrap();
        let frame = Command::WriteEeprom {
            id: id(4),
            image: Box::new(image),
        }
        .encode()
        .unwrap();
        assert_eq!(frame.len(), 66);
        assert_eq!(&frame[..2], &[0xC4, 0x00]);
        assert!(frame[2..].iter().all(|b| *b == 0x3));
    }

    #[test]
    fn test_expected_lengths() {
        let id = id(1);
        assert_eq!(Command::Position { id, pulse: 7500 }.expected_len(), 6);
        assert_eq!(
            Command::GetParam {
                id,
                param: ParamKind::Speed
            }
            .expected_len(),
            5
        );
        assert_eq!(
            Command::GetParam {
                id,
                param: ParamKind::Eeprom
            }
            .expected_len(),
            68
        );
        assert_eq!(
            Command::SetParam {
                id,
                param: ParamKind::Speed,
                value: 1
            }
            .expected_len(),
            6
        );
        assert_eq!(Command::GetId.expected_len(), 5);
    }

    #[test]
    fn test_timeout_classes() {
        let id = id(1);
        assert_eq!(Command::Free { id }.timeout(), Duration::from_millis(2000));
        assert_eq!(
            Command::GetParam {
                id,
                param: ParamKind::Stretch
            }
            .timeout(),
            Duration::from_millis(2000)
        );
        assert_eq!(Command::SetId { id }.timeout(), Duration::from_millis(4000));
        assert_eq!(TimeoutClass::Receive.duration(), Duration::from_millis(1000));
    }

    #[test]
    fn test_param_kind_from_str() {
        assert_eq!("Speed".parse::<ParamKind>().unwrap(), ParamKind::Speed);
        assert!("torque".parse::<ParamKind>().is_err());
    }
}
