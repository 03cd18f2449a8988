//! EEPROM 镜像
//!
//! ICS 舵机的 EEPROM 为 64 个槽位，每个槽位只携带一个 4 bit 半字节，
//! 一个逻辑字节由相邻两个槽位（高半字节在前）拼成。
//!
//! | 槽位 | 含义 |
//! |------|------|
//! | 0-1  | 固定头 |
//! | 2-3  | stretch |
//! | 4-5  | speed |
//! | 14   | 模式标志高半字节（slave / wheel） |
//! | 15   | 模式标志低半字节（pwm-inhibit / free / reverse） |

use crate::ProtocolError;
use crate::constants::*;
use std::fmt;

/// EEPROM 槽位数量
pub const EEPROM_LEN: usize = 64;

const SLOT_STRETCH: usize = 2;
const SLOT_SPEED: usize = 4;
const SLOT_FLAGS_HIGH: usize = 14;
const SLOT_FLAGS_LOW: usize = 15;

/// 模式标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeFlag {
    /// 从机模式（不应答，仅跟随）
    Slave,
    /// 轮模式（无限旋转）
    Wheel,
    /// PWM 禁止
    PwmInhibit,
    /// 上电脱力
    Free,
    /// 反转
    Reverse,
}

impl ModeFlag {
    /// 所有标志（用于清除全部标志）
    pub const ALL: [ModeFlag; 5] = [
        ModeFlag::Slave,
        ModeFlag::Wheel,
        ModeFlag::PwmInhibit,
        ModeFlag::Free,
        ModeFlag::Reverse,
    ];

    /// 标志所在槽位与掩码
    pub fn location(self) -> (usize, u8) {
        match self {
            ModeFlag::Slave => (SLOT_FLAGS_HIGH, ICS_FLAG_SLAVE),
            ModeFlag::Wheel => (SLOT_FLAGS_HIGH, ICS_FLAG_WHEEL),
            ModeFlag::PwmInhibit => (SLOT_FLAGS_LOW, ICS_FLAG_PWMINH),
            ModeFlag::Free => (SLOT_FLAGS_LOW, ICS_FLAG_FREE),
            ModeFlag::Reverse => (SLOT_FLAGS_LOW, ICS_FLAG_REVERSE),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModeFlag::Slave => "slave",
            ModeFlag::Wheel => "wheel",
            ModeFlag::PwmInhibit => "pwminh",
            ModeFlag::Free => "free",
            ModeFlag::Reverse => "reverse",
        }
    }
}

impl fmt::Display for ModeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ModeFlag {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModeFlag::ALL
            .into_iter()
            .find(|flag| flag.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::InvalidValue {
                field: format!("mode flag '{s}'"),
                value: 0,
            })
    }
}

/// 64 槽位 EEPROM 镜像
#[derive(Clone, PartialEq, Eq)]
pub struct EepromImage([u8; EEPROM_LEN]);

impl EepromImage {
    /// 从线上字节构建
    ///
    /// # Errors
    /// - `ProtocolError::Malformed`: 长度不是 64，或某个槽位超出 4 bit
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let data: [u8; EEPROM_LEN] =
            bytes.try_into().map_err(|_| ProtocolError::Malformed {
                expected: EEPROM_LEN,
                actual: bytes.len(),
            })?;
        if data.iter().any(|b| *b > 0x0F) {
            return Err(ProtocolError::Malformed {
                expected: EEPROM_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self(data))
    }

    pub fn as_bytes(&self) -> &[u8; EEPROM_LEN] {
        &self.0
    }

    /// 读取由两个槽位拼成的逻辑字节
    fn byte_at(&self, slot: usize) -> u8 {
        (self.0[slot] << 4) | self.0[slot + 1]
    }

    pub fn stretch(&self) -> u8 {
        self.byte_at(SLOT_STRETCH)
    }

    pub fn speed(&self) -> u8 {
        self.byte_at(SLOT_SPEED)
    }

    /// 模式标志字节（高半字节 | 低半字节）
    pub fn flag_byte(&self) -> u8 {
        self.byte_at(SLOT_FLAGS_HIGH)
    }

    pub fn flag(&self, flag: ModeFlag) -> bool {
        let (slot, mask) = flag.location();
        self.0[slot] & mask != 0
    }

    pub fn set_flag(&mut self, flag: ModeFlag, on: bool) {
        let (slot, mask) = flag.location();
        if on {
            self.0[slot] |= mask;
        } else {
            self.0[slot] &= !mask;
        }
    }

    pub fn clear_flags(&mut self) {
        for flag in ModeFlag::ALL {
            self.set_flag(flag, false);
        }
    }
}

impl fmt::Debug for EepromImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EepromImage")
            .field("stretch", &self.stretch())
            .field("speed", &self.speed())
            .field("flags", &format_args!("0x{:02X}", self.flag_byte()))
            .finish()
    }
}

impl fmt::Display for EepromImage {
    /// 每行 16 个槽位的十六进制转储
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.0.chunks(16).enumerate() {
            write!(f, "{:02X}:", row * 16)?;
            for b in chunk {
                write!(f, " {b:X}")?;
            }
            if row + 1 < EEPROM_LEN / 16 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EepromImage {
        let mut bytes = [0u8; EEPROM_LEN];
        bytes[0] = 0x5;
        bytes[1] = 0xA;
        bytes[SLOT_STRETCH] = 0x3;
        bytes[SLOT_STRETCH + 1] = 0xC;
        bytes[SLOT_SPEED] = 0x7;
        bytes[SLOT_SPEED + 1] = 0xF;
        EepromImage::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        assert!(matches!(
            EepromImage::from_bytes(&[0u8; 10]),
            Err(ProtocolError::Malformed {
                expected: 64,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_from_bytes_rejects_wide_slot() {
        let mut bytes = [0u8; EEPROM_LEN];
        bytes[7] = 0x10;
        assert!(EepromImage::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_logical_bytes() {
        let image = sample();
        assert_eq!(image.stretch(), 0x3C);
        assert_eq!(image.speed(), 0x7F);
        assert_eq!(image.flag_byte(), 0x00);
    }

    #[test]
    fn test_flags_share_slots_without_clobbering() {
        let mut image = sample();
        image.set_flag(ModeFlag::Slave, true);
        image.set_flag(ModeFlag::Reverse, true);
        assert!(image.flag(ModeFlag::Slave));
        assert!(image.flag(ModeFlag::Reverse));
        assert!(!image.flag(ModeFlag::Wheel));
        assert!(!image.flag(ModeFlag::PwmInhibit));
        assert_eq!(image.flag_byte(), 0x81);

        // Slave 与 PwmInhibit 掩码相同但位于不同槽位
        image.set_flag(ModeFlag::PwmInhibit, true);
        assert_eq!(image.flag_byte(), 0x89);
        image.set_flag(ModeFlag::Slave, false);
        assert_eq!(image.flag_byte(), 0x09);
    }

    #[test]
    fn test_clear_flags_keeps_other_slots() {
        let mut image = sample();
        for flag in ModeFlag::ALL {
            image.set_flag(flag, true);
        }
        assert_eq!(image.flag_byte(), 0x9B);
        image.clear_flags();
        assert_eq!(image.flag_byte(), 0x00);
        assert_eq!(image.stretch(), 0x3C);
    }

    #[test]
    fn test_mode_flag_from_str() {
        assert_eq!("SLAVE".parse::<ModeFlag>().unwrap(), ModeFlag::Slave);
        assert_eq!("pwminh".parse::<ModeFlag>().unwrap(), ModeFlag::PwmInhibit);
        assert!("turbo".parse::<ModeFlag>().is_err());
    }

    #[test]
    fn test_display_dump() {
        let dump = sample().to_string();
        assert_eq!(dump.lines().count(), 4);
        assert!(dump.starts_with("00: 5 A 3 C 7 F"));
    }
}
