//! Actuator 配置
//!
//! 配置值以普通数值类型给出（角度单位为度），由 [`ActuatorConfig::validate`]
//! 转换为强类型并检查范围。

use crate::error::ConfigError;
use kondo_protocol::{MAX_PARAM_VALUE, ParamKind, ServoId, degrees_to_radians};

/// 电流读取策略
///
/// 电流读取是每个 tick 额外的一次半双工往返，默认关闭。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CurrentReadPolicy {
    #[default]
    Never,
    EveryTick,
    /// 每 n 个 tick 读取一次（n = 0 等同于 `Never`）
    Every(u32),
}

impl CurrentReadPolicy {
    /// 第 `tick` 次（从 0 开始计数）是否需要读取电流
    pub fn should_read(self, tick: u64) -> bool {
        match self {
            CurrentReadPolicy::Never => false,
            CurrentReadPolicy::EveryTick => true,
            CurrentReadPolicy::Every(0) => false,
            CurrentReadPolicy::Every(n) => tick % n as u64 == 0,
        }
    }
}

/// 断电（power off）时的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PowerOffBehavior {
    /// 每个 tick 发送 `Free{id}`
    #[default]
    Free,
    /// 不发送任何命令
    SkipCommand,
}

/// 单个关节的配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorConfig {
    /// 舵机 ID（1-31，同一链路上唯一）
    pub id: u8,
    pub joint_name: String,
    /// 角度下限（度）
    #[cfg_attr(feature = "serde", serde(default = "default_min_angle"))]
    pub min_angle: f64,
    /// 角度上限（度）
    #[cfg_attr(feature = "serde", serde(default = "default_max_angle"))]
    pub max_angle: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub stretch: Option<u8>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub speed: Option<u8>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub current_limit: Option<u8>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub temperature_limit: Option<u8>,
    /// 不访问总线，直接把命令值作为观测值
    #[cfg_attr(feature = "serde", serde(default))]
    pub loopback: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub current_read: CurrentReadPolicy,
    #[cfg_attr(feature = "serde", serde(default))]
    pub power_off: PowerOffBehavior,
}

/// 舵机全行程 270°，中心为 0
pub const DEFAULT_MIN_ANGLE: f64 = -135.0;
pub const DEFAULT_MAX_ANGLE: f64 = 135.0;

#[cfg(feature = "serde")]
fn default_min_angle() -> f64 {
    DEFAULT_MIN_ANGLE
}

#[cfg(feature = "serde")]
fn default_max_angle() -> f64 {
    DEFAULT_MAX_ANGLE
}

impl ActuatorConfig {
    /// 使用默认角度范围（±135°）创建
    pub fn new(id: u8, joint_name: impl Into<String>) -> Self {
        Self {
            id,
            joint_name: joint_name.into(),
            min_angle: DEFAULT_MIN_ANGLE,
            max_angle: DEFAULT_MAX_ANGLE,
            stretch: None,
            speed: None,
            current_limit: None,
            temperature_limit: None,
            loopback: false,
            current_read: CurrentReadPolicy::Never,
            power_off: PowerOffBehavior::Free,
        }
    }

    /// 设置角度范围（度）
    pub fn with_bounds(mut self, min_angle: f64, max_angle: f64) -> Self {
        self.min_angle = min_angle;
        self.max_angle = max_angle;
        self
    }

    pub fn with_stretch(mut self, value: u8) -> Self {
        self.stretch = Some(value);
        self
    }

    pub fn with_speed(mut self, value: u8) -> Self {
        self.speed = Some(value);
        self
    }

    pub fn with_current_limit(mut self, value: u8) -> Self {
        self.current_limit = Some(value);
        self
    }

    pub fn with_temperature_limit(mut self, value: u8) -> Self {
        self.temperature_limit = Some(value);
        self
    }

    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    pub fn with_current_read(mut self, policy: CurrentReadPolicy) -> Self {
        self.current_read = policy;
        self
    }

    pub fn with_power_off(mut self, behavior: PowerOffBehavior) -> Self {
        self.power_off = behavior;
        self
    }

    /// 已给出的可调参数（按下发顺序）
    pub fn tunables(&self) -> impl Iterator<Item = (ParamKind, u8)> + '_ {
        [
            (ParamKind::Stretch, self.stretch),
            (ParamKind::Speed, self.speed),
            (ParamKind::Current, self.current_limit),
            (ParamKind::Temperature, self.temperature_limit),
        ]
        .into_iter()
        .filter_map(|(param, value)| value.map(|v| (param, v)))
    }

    /// 角度范围（弧度）
    pub fn bounds_radians(&self) -> (f64, f64) {
        (
            degrees_to_radians(self.min_angle),
            degrees_to_radians(self.max_angle),
        )
    }

    /// 检查配置并返回强类型舵机 ID
    ///
    /// # Errors
    /// - `ConfigError::InvalidServoId`: ID 不在 1-31
    /// - `ConfigError::InvalidAngleBounds`: `min_angle >= max_angle` 或出现 NaN
    /// - `ConfigError::InvalidParameter`: 可调参数超过 127
    pub fn validate(&self) -> Result<ServoId, ConfigError> {
        let id = ServoId::new(self.id)
            .ok()
            .filter(|id| id.get() >= 1)
            .ok_or_else(|| ConfigError::InvalidServoId {
                joint: self.joint_name.clone(),
                id: self.id,
            })?;

        // 取反写法同时拒绝 NaN
        if !(self.min_angle < self.max_angle) {
            return Err(ConfigError::InvalidAngleBounds {
                joint: self.joint_name.clone(),
                min: self.min_angle,
                max: self.max_angle,
            });
        }

        if let Some((param, value)) = self.tunables().find(|(_, v)| *v > MAX_PARAM_VALUE) {
            return Err(ConfigError::InvalidParameter {
                joint: self.joint_name.clone(),
                param,
                value,
            });
        }

        Ok(id)
    }
}
