//! 控制循环配置文件
//!
//! ```toml
//! [link]
//! product_id = 0x0006
//! period_ms = 10
//!
//! [[actuators]]
//! id = 1
//! joint_name = "pan"
//! min_angle = -90.0
//! max_angle = 90.0
//! speed = 100
//! current_read = { every = 10 }
//! ```

use anyhow::{Context, Result, bail};
use kondo_driver::{ActuatorConfig, DEFAULT_PERIOD};
use kondo_protocol::{ICS_USB_PID, ICS_USB_VID};
use kondo_serial::LinkParams;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// `[link]` 表
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkSection {
    pub vendor_id: u16,
    pub product_id: u16,
    pub port: Option<String>,
    /// 不打开硬件，所有关节强制 loopback
    pub loopback: bool,
    pub period_ms: u64,
    pub debug: bool,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            vendor_id: ICS_USB_VID,
            product_id: ICS_USB_PID,
            port: None,
            loopback: false,
            period_ms: DEFAULT_PERIOD.as_millis() as u64,
            debug: false,
        }
    }
}

impl LinkSection {
    pub fn params(&self) -> LinkParams {
        LinkParams {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            port: self.port.clone(),
            debug: self.debug,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// 完整的运行配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub link: LinkSection,
    #[serde(default)]
    pub actuators: Vec<ActuatorConfig>,
}

impl RunConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(content).context("invalid run configuration")?;
        if config.link.period_ms == 0 {
            bail!("link.period_ms must be greater than 0");
        }
        if config.actuators.is_empty() {
            bail!("configuration defines no [[actuators]]");
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("in {}", path.display()))
    }

    /// 所有关节都是 loopback 时不需要打开硬件
    pub fn needs_hardware(&self) -> bool {
        !self.link.loopback && self.actuators.iter().any(|a| !a.loopback)
    }
}
