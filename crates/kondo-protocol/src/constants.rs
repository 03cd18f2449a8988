//! 协议常量定义
//!
//! 命令字、子命令、模式标志位、超时等级和脉宽范围。

use std::time::Duration;

// ============================================================================
// 链路参数
// ============================================================================

/// ICS 总线波特率（固定）
pub const ICS_BAUD: u32 = 115_200;

/// FTDI 默认 Vendor ID
pub const ICS_USB_VID: u16 = 0x0403;

/// Kondo ICS USB 适配器 HS 的 Product ID（默认值）
pub const ICS_USB_PID: u16 = 0x0006;

/// Kondo Dual USB 适配器 HS 的 Product ID
pub const ICS_DUAL_USB_PID: u16 = 0x0008;

/// 通用 FTDI FT232 的 Product ID
pub const FTDI_FT232_PID: u16 = 0x6001;

// ============================================================================
// 命令字（高 3 bit）
// ============================================================================

/// 位置指令
pub const ICS_CMD_POS: u8 = 0x80;
/// 参数读取
pub const ICS_CMD_GET: u8 = 0xA0;
/// 参数写入
pub const ICS_CMD_SET: u8 = 0xC0;
/// ID 读写
pub const ICS_CMD_ID: u8 = 0xE0;

/// 命令字掩码
pub const ICS_CMD_MASK: u8 = 0xE0;
/// ID 掩码（低 5 bit）
pub const ICS_ID_MASK: u8 = 0x1F;
/// 7 bit 数据掩码（最高位保留给命令字）
pub const ICS_DATA_MASK: u8 = 0x7F;

// ============================================================================
// 子命令
// ============================================================================

pub const ICS_SC_EEPROM: u8 = 0;
pub const ICS_SC_STRETCH: u8 = 1;
pub const ICS_SC_SPEED: u8 = 2;
pub const ICS_SC_CURRENT: u8 = 3;
pub const ICS_SC_TEMPERATURE: u8 = 4;

pub const ICS_SC_READ: u8 = 0;
pub const ICS_SC_WRITE: u8 = 1;

// ============================================================================
// 模式标志位（EEPROM 标志字节的高/低半字节）
// ============================================================================

/// 高半字节：从机模式
pub const ICS_FLAG_SLAVE: u8 = 0x08;
/// 高半字节：无限旋转（轮模式）
pub const ICS_FLAG_WHEEL: u8 = 0x01;
/// 低半字节：PWM 禁止
pub const ICS_FLAG_PWMINH: u8 = 0x08;
/// 低半字节：上电脱力
pub const ICS_FLAG_FREE: u8 = 0x02;
/// 低半字节：反转
pub const ICS_FLAG_REVERSE: u8 = 0x01;

// ============================================================================
// 超时等级
// ============================================================================

/// 原始接收超时
pub const ICS_RX_TIMEOUT: Duration = Duration::from_millis(1000);
/// 位置指令超时
pub const ICS_POS_TIMEOUT: Duration = Duration::from_millis(2000);
/// 参数读取超时
pub const ICS_GET_TIMEOUT: Duration = Duration::from_millis(2000);
/// 参数写入超时
pub const ICS_SET_TIMEOUT: Duration = Duration::from_millis(2000);
/// ID 读写超时（舵机写 EEPROM 较慢）
pub const ICS_ID_TIMEOUT: Duration = Duration::from_millis(4000);

// ============================================================================
// 脉宽
// ============================================================================

pub const MAX_PULSE: u16 = 11500;
pub const MIN_PULSE: u16 = 3500;
pub const CNT_PULSE: u16 = 7500;

/// 位置指令中表示"脱力"的脉宽值
pub const FREE_PULSE: u16 = 0;

/// 参数值上限（7 bit）
pub const MAX_PARAM_VALUE: u8 = 127;
