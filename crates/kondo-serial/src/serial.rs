//! USB 串口链路
//!
//! Kondo ICS USB 适配器是 FTDI 芯片，在系统中表现为普通串口。
//! 线路参数固定为 115200 bps、8 数据位、偶校验、1 停止位。

use crate::{IcsLink, LinkError};
use kondo_protocol::{ICS_BAUD, ICS_RX_TIMEOUT, ICS_USB_PID, ICS_USB_VID};
use serialport::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType,
    StopBits,
};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 链路打开参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkParams {
    /// USB Vendor ID（默认 FTDI 0x0403）
    pub vendor_id: u16,
    /// USB Product ID（默认 ICS USB 适配器 HS 0x0006）
    pub product_id: u16,
    /// 显式指定设备节点（如 `/dev/ttyUSB0`），设置后跳过 VID/PID 查找
    pub port: Option<String>,
    /// 以 debug 级别输出每一帧的十六进制转储
    pub debug: bool,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            vendor_id: ICS_USB_VID,
            product_id: ICS_USB_PID,
            port: None,
            debug: false,
        }
    }
}

/// 基于 `serialport` 的 ICS 链路
pub struct SerialLink {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    last_error: Option<String>,
    debug: bool,
}

impl SerialLink {
    /// 按 VID/PID 查找并打开适配器
    ///
    /// # Errors
    /// - `LinkError::DeviceNotFound`: 没有匹配的 USB 串口
    /// - `LinkError::ConfigureFailed`: 端口无法打开或线路参数设置失败
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self, LinkError> {
        let name = find_port(vendor_id, product_id)?;
        Self::open_path(&name)
    }

    /// 按参数打开（`port` 优先于 VID/PID）
    pub fn open_with(params: &LinkParams) -> Result<Self, LinkError> {
        let mut link = match &params.port {
            Some(path) => Self::open_path(path)?,
            None => Self::open(params.vendor_id, params.product_id)?,
        };
        link.set_debug(params.debug);
        Ok(link)
    }

    /// 打开指定设备节点
    pub fn open_path(path: &str) -> Result<Self, LinkError> {
        let mut port = serialport::new(path, ICS_BAUD)
            .data_bits(DataBits::Eight)
            .parity(Parity::Even)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(ICS_RX_TIMEOUT)
            .open()
            .map_err(|e| LinkError::ConfigureFailed(format!("{path}: {e}")))?;

        port.clear(ClearBuffer::All)
            .map_err(|e| LinkError::ConfigureFailed(format!("{path}: {e}")))?;

        info!("ICS link opened on {} ({} bps, 8E1)", path, ICS_BAUD);
        Ok(Self {
            port: Some(port),
            name: path.to_string(),
            last_error: None,
            debug: false,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.name
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, LinkError> {
        self.port.as_mut().ok_or(LinkError::NotOpen)
    }

    /// 记录错误信息后原样返回
    fn record(&mut self, err: LinkError) -> LinkError {
        self.last_error = Some(err.to_string());
        err
    }

    fn read_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError> {
        let deadline = Instant::now() + timeout;
        let mut received = 0;
        let port = self.port_mut()?;

        while received < buf.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            port.set_timeout(deadline - now)
                .map_err(|e| LinkError::ReadFailed(e.to_string()))?;
            match port.read(&mut buf[received..]) {
                Ok(n) => received += n,
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {},
                Err(e) => return Err(LinkError::ReadFailed(e.to_string())),
            }
        }
        Ok(received)
    }
}

impl IcsLink for SerialLink {
    fn purge(&mut self) -> Result<(), LinkError> {
        let result = self
            .port_mut()?
            .clear(ClearBuffer::All)
            .map_err(|e| LinkError::ReadFailed(format!("purge: {e}")));
        result.map_err(|e| self.record(e))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.debug {
            debug!("ics tx [{}] {}", bytes.len(), hex::encode(bytes));
        }
        let port = self.port_mut()?;
        let result = port
            .write_all(bytes)
            .and_then(|_| port.flush())
            .map_err(|e| LinkError::WriteFailed(e.to_string()));
        result.map_err(|e| self.record(e))
    }

    fn read_until(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let mut buf = vec![0u8; n];
        let received = self
            .read_into(&mut buf, timeout)
            .map_err(|e| self.record(e))?;

        if self.debug {
            debug!("ics rx [{}/{}] {}", received, n, hex::encode(&buf[..received]));
        }
        if received < n {
            return Err(self.record(LinkError::Timeout {
                expected: n,
                received,
                timeout,
            }));
        }
        Ok(buf)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("ICS link closed ({})", self.name);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// 在系统串口中查找 VID/PID 匹配的 USB 适配器
fn find_port(vendor_id: u16, product_id: u16) -> Result<String, LinkError> {
    let ports = serialport::available_ports()
        .map_err(|e| LinkError::ConfigureFailed(format!("port enumeration failed: {e}")))?;

    let found = select_port(
        ports.iter().map(|p| (p.port_name.as_str(), usb_ids(p))),
        vendor_id,
        product_id,
    );
    match found {
        Some(name) => Ok(name),
        None => {
            warn!(
                "No serial port matches 0x{:04X}:0x{:04X} ({} ports scanned)",
                vendor_id,
                product_id,
                ports.len()
            );
            Err(LinkError::DeviceNotFound {
                vendor_id,
                product_id,
            })
        },
    }
}

fn usb_ids(info: &SerialPortInfo) -> Option<(u16, u16)> {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => Some((usb.vid, usb.pid)),
        _ => None,
    }
}

/// 返回第一个 VID/PID 匹配的端口名
fn select_port<'a>(
    candidates: impl IntoIterator<Item = (&'a str, Option<(u16, u16)>)>,
    vendor_id: u16,
    product_id: u16,
) -> Option<String> {
    candidates
        .into_iter()
        .find(|(_, ids)| *ids == Some((vendor_id, product_id)))
        .map(|(name, _)| name.to_string())
}
