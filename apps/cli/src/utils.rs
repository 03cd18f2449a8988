//! 参数解析工具
//!
//! 链路参数（VID/PID/端口）和数值解析。Product ID 按十六进制解析，
//! 与 Kondo 附带的诊断工具用法一致（`0006` 或 `0x0006`）。

use anyhow::{Context, Result};
use clap::Args;
use kondo_driver::Bus;
use kondo_protocol::{ICS_USB_PID, ICS_USB_VID, ServoId};
use kondo_serial::{LinkParams, SerialLink};

/// 解析十六进制 u16（允许 `0x` 前缀）
pub fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value '{s}': {e}"))
}

/// 解析舵机 ID（0-31）
pub fn parse_servo_id(s: &str) -> Result<ServoId, String> {
    let value: u8 = s.parse().map_err(|e| format!("invalid servo id '{s}': {e}"))?;
    ServoId::new(value).map_err(|e| e.to_string())
}

/// 全局链路参数
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// USB Vendor ID（十六进制）
    #[arg(long, global = true, value_parser = parse_hex_u16, default_value = "0403")]
    pub vendor_id: u16,

    /// USB Product ID（十六进制，如 0006 / 0008 / 6001）
    #[arg(long, global = true, value_parser = parse_hex_u16, default_value = "0006")]
    pub product_id: u16,

    /// 直接指定串口设备（跳过 VID/PID 查找）
    #[arg(long, global = true)]
    pub port: Option<String>,

    /// 输出每一帧的十六进制转储（需要 RUST_LOG=debug）
    #[arg(long, global = true)]
    pub debug: bool,
}

impl Default for LinkArgs {
    fn default() -> Self {
        Self {
            vendor_id: ICS_USB_VID,
            product_id: ICS_USB_PID,
            port: None,
            debug: false,
        }
    }
}

impl LinkArgs {
    pub fn to_params(&self) -> LinkParams {
        LinkParams {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            port: self.port.clone(),
            debug: self.debug,
        }
    }

    /// 打开链路并包装为事务引擎
    pub fn open_bus(&self) -> Result<Bus<SerialLink>> {
        let link = SerialLink::open_with(&self.to_params()).with_context(|| {
            match &self.port {
                Some(port) => format!("failed to open {port}"),
                None => format!(
                    "failed to open ICS adapter 0x{:04X}:0x{:04X}",
                    self.vendor_id, self.product_id
                ),
            }
        })?;
        Ok(Bus::new(link))
    }
}

/// 解析角度（度），拒绝 NaN/无穷
pub fn parse_degrees(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("invalid angle '{s}': {e}"))?;
    if !value.is_finite() {
        return Err(format!("angle must be finite, got {s}"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u16() {
        assert_eq!(parse_hex_u16("0006").unwrap(), 0x0006);
        assert_eq!(parse_hex_u16("0x6001").unwrap(), 0x6001);
        assert_eq!(parse_hex_u16("0X0008").unwrap(), 0x0008);
        assert_eq!(parse_hex_u16("403").unwrap(), 0x0403);
        assert!(parse_hex_u16("zz").is_err());
        assert!(parse_hex_u16("10000").is_err());
    }

    #[test]
    fn test_parse_servo_id() {
        assert_eq!(parse_servo_id("31").unwrap().get(), 31);
        assert!(parse_servo_id("32").is_err());
        assert!(parse_servo_id("-1").is_err());
    }

    #[test]
    fn test_parse_degrees() {
        assert_eq!(parse_degrees("-45.5").unwrap(), -45.5);
        assert!(parse_degrees("inf").is_err());
        assert!(parse_degrees("abc").is_err());
    }

    #[test]
    fn test_link_args_to_params() {
        let args = LinkArgs {
            product_id: 0x6001,
            port: Some("/dev/ttyUSB0".to_string()),
            ..LinkArgs::default()
        };
        let params = args.to_params();
        assert_eq!(params.vendor_id, 0x0403);
        assert_eq!(params.product_id, 0x6001);
        assert_eq!(params.port.as_deref(), Some("/dev/ttyUSB0"));
    }
}
