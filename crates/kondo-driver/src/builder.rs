//! Builder 模式实现
//!
//! 提供链式构造 `KondoDriver` 实例的便捷方式。

use crate::config::ActuatorConfig;
use crate::driver::KondoDriver;
use crate::error::DriverError;
use kondo_serial::{IcsLink, LinkParams, SerialLink};

/// KondoDriver Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use kondo_driver::{ActuatorConfig, KondoDriverBuilder};
///
/// let driver = KondoDriverBuilder::new()
///     .product_id(0x0006)
///     .actuator(ActuatorConfig::new(1, "shoulder").with_bounds(-90.0, 90.0))
///     .actuator(ActuatorConfig::new(2, "elbow").with_speed(100))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct KondoDriverBuilder {
    params: LinkParams,
    actuators: Vec<ActuatorConfig>,
    /// 任何配置被拒绝时整体失败
    strict: bool,
}

impl KondoDriverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// USB Vendor ID（默认 0x0403）
    pub fn vendor_id(mut self, vendor_id: u16) -> Self {
        self.params.vendor_id = vendor_id;
        self
    }

    /// USB Product ID（默认 0x0006）
    pub fn product_id(mut self, product_id: u16) -> Self {
        self.params.product_id = product_id;
        self
    }

    /// 直接指定设备节点（跳过 VID/PID 查找）
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.params.port = Some(port.into());
        self
    }

    /// 输出每一帧的十六进制转储
    pub fn debug(mut self, debug: bool) -> Self {
        self.params.debug = debug;
        self
    }

    pub fn link_params(mut self, params: LinkParams) -> Self {
        self.params = params;
        self
    }

    pub fn actuator(mut self, config: ActuatorConfig) -> Self {
        self.actuators.push(config);
        self
    }

    pub fn actuators(mut self, configs: impl IntoIterator<Item = ActuatorConfig>) -> Self {
        self.actuators.extend(configs);
        self
    }

    /// 严格模式：任何关节配置被拒绝时 `build` 返回错误
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// 打开 USB 串口链路并注册全部关节
    ///
    /// # Errors
    /// - `DriverError::Link`: 链路打开失败
    /// - `DriverError::Config`: 严格模式下有关节配置被拒绝
    pub fn build(self) -> Result<KondoDriver<SerialLink>, DriverError> {
        let link = SerialLink::open_with(&self.params)?;
        self.build_with_link(link)
    }

    /// 使用已打开的链路构建
    pub fn build_with_link<L: IcsLink>(self, link: L) -> Result<KondoDriver<L>, DriverError> {
        let mut driver = KondoDriver::new(link);
        let report = driver.register(self.actuators);
        if self.strict
            && let Some((_, e)) = report.rejected.into_iter().next()
        {
            return Err(e.into());
        }
        Ok(driver)
    }
}
