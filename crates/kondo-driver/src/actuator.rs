//! 单关节 Actuator
//!
//! 把逻辑关节命令（角度、上电/断电）翻译为 ICS 事务，负责角度钳位、单位换算，
//! 以及 `Unconfigured → Ready → {Ready, Degraded}` 状态机。
//!
//! Actuator 不持有链路，每次调用都显式传入 [`Bus`]。

use crate::bus::Bus;
use crate::config::{ActuatorConfig, PowerOffBehavior};
use crate::error::{ConfigError, TransactionError};
use kondo_protocol::{
    Command, FREE_PULSE, ParamKind, ServoId, current_to_effort, pulse_to_radian, radian_to_pulse,
};
use kondo_serial::IcsLink;
use tracing::{debug, info, warn};

/// Actuator 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorStatus {
    /// 已创建，尚未下发初始参数
    Unconfigured,
    Ready,
    /// 最近一次事务失败；下一次成功的事务自动恢复为 `Ready`
    Degraded,
}

/// 单个 tick 的关节命令
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointCommand {
    /// 目标角度（弧度）
    pub position: f64,
    /// false 时舵机脱力
    pub power: bool,
}

impl JointCommand {
    pub fn new(position: f64, power: bool) -> Self {
        Self { position, power }
    }

    /// 上电并移动到 `position`
    pub fn powered(position: f64) -> Self {
        Self::new(position, true)
    }

    pub fn off() -> Self {
        Self::default()
    }
}

/// Actuator 状态快照
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActuatorState {
    /// 钳位后的命令角度（弧度）
    pub commanded: f64,
    /// 观测位置（弧度）
    pub position: f64,
    /// 恒为 0（ICS 不提供速度反馈）
    pub velocity: f64,
    /// 带符号的电流代理值
    pub effort: f64,
    pub power_enabled: bool,
}

/// 已生效的可调参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppliedParams {
    pub stretch: Option<u8>,
    pub speed: Option<u8>,
    pub current_limit: Option<u8>,
    pub temperature_limit: Option<u8>,
}

impl AppliedParams {
    fn set(&mut self, param: ParamKind, value: u8) {
        match param {
            ParamKind::Stretch => self.stretch = Some(value),
            ParamKind::Speed => self.speed = Some(value),
            ParamKind::Current => self.current_limit = Some(value),
            ParamKind::Temperature => self.temperature_limit = Some(value),
            ParamKind::Eeprom => {},
        }
    }
}

/// 单个关节
#[derive(Debug)]
pub struct Actuator {
    config: ActuatorConfig,
    id: ServoId,
    /// 角度范围（弧度）
    bounds: (f64, f64),
    status: ActuatorStatus,
    state: ActuatorState,
    applied: AppliedParams,
    ticks: u64,
    consecutive_failures: u64,
}

impl Actuator {
    /// 校验配置并创建（状态为 `Unconfigured`）
    ///
    /// # Errors
    /// - `ConfigError`: 见 [`ActuatorConfig::validate`]
    pub fn new(config: ActuatorConfig) -> Result<Self, ConfigError> {
        let id = config.validate()?;
        let bounds = config.bounds_radians();
        Ok(Self {
            config,
            id,
            bounds,
            status: ActuatorStatus::Unconfigured,
            state: ActuatorState::default(),
            applied: AppliedParams::default(),
            ticks: 0,
            consecutive_failures: 0,
        })
    }

    pub fn id(&self) -> ServoId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.joint_name
    }

    pub fn config(&self) -> &ActuatorConfig {
        &self.config
    }

    pub fn status(&self) -> ActuatorStatus {
        self.status
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn applied(&self) -> AppliedParams {
        self.applied
    }

    pub fn is_loopback(&self) -> bool {
        self.config.loopback
    }

    /// 连续失败的事务数（成功后清零）
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    /// 把角度钳位到 `[min_angle, max_angle]`（弧度）；NaN 保持上一次的命令值
    pub fn clamp(&self, angle: f64) -> f64 {
        if angle.is_nan() {
            return self.state.commanded;
        }
        angle.clamp(self.bounds.0, self.bounds.1)
    }

    /// 下发初始可调参数
    ///
    /// 每个失败的 setter 只记录警告，对应的 [`AppliedParams`] 字段保持原值。
    /// 返回下发失败的参数。
    pub fn configure<L: IcsLink>(&mut self, bus: &Bus<L>) -> Vec<ParamKind> {
        let tunables: Vec<_> = self.config.tunables().collect();
        let mut failed = Vec::new();

        if self.config.loopback {
            for (param, value) in tunables {
                self.applied.set(param, value);
            }
        } else {
            for (param, value) in tunables {
                let command = Command::SetParam {
                    id: self.id,
                    param,
                    value,
                };
                match bus.execute(&command) {
                    Ok(reply) => {
                        self.applied.set(param, reply.param_value().unwrap_or(value));
                    },
                    Err(e) => {
                        warn!(
                            "Joint '{}' (servo {}): failed to set {} = {}: {}",
                            self.config.joint_name, self.id, param, value, e
                        );
                        failed.push(param);
                    },
                }
            }
        }

        self.status = if failed.is_empty() {
            ActuatorStatus::Ready
        } else {
            ActuatorStatus::Degraded
        };
        info!(
            "Joint '{}' configured (servo {}, {}{:?})",
            self.config.joint_name,
            self.id,
            if self.config.loopback { "loopback, " } else { "" },
            self.status
        );
        failed
    }

    /// 执行一个控制周期
    ///
    /// 事务失败时进入 `Degraded`，保留上一次的位置和力矩。
    pub fn tick<L: IcsLink>(&mut self, bus: &Bus<L>, command: JointCommand) -> ActuatorState {
        let target = self.clamp(command.position);
        let tick = self.ticks;
        self.ticks += 1;
        self.state.commanded = target;
        self.state.power_enabled = command.power;
        self.state.velocity = 0.0;

        if self.config.loopback {
            if command.power {
                self.state.position = target;
            }
            self.state.effort = 0.0;
            self.status = ActuatorStatus::Ready;
            return self.state;
        }

        if !command.power {
            self.state.effort = 0.0;
            if self.config.power_off == PowerOffBehavior::Free {
                let result = bus.execute(&Command::Free { id: self.id });
                self.record("free", result.map(|_| ()));
            }
            return self.state;
        }

        let pulse = radian_to_pulse(target);
        match bus.execute(&Command::Position { id: self.id, pulse }) {
            Ok(reply) => {
                if let Some(achieved) = reply.pulse().filter(|p| *p != FREE_PULSE) {
                    self.state.position = pulse_to_radian(achieved);
                }
                self.record("position", Ok(()));
            },
            Err(e) => {
                self.record("position", Err(e));
                return self.state;
            },
        }

        if self.config.current_read.should_read(tick) {
            let command = Command::GetParam {
                id: self.id,
                param: ParamKind::Current,
            };
            match bus.execute(&command) {
                Ok(reply) => {
                    if let Some(current) = reply.param_value() {
                        self.state.effort = current_to_effort(current);
                    }
                    self.record("current read", Ok(()));
                },
                Err(e) => self.record("current read", Err(e)),
            }
        }

        self.state
    }

    fn record(&mut self, what: &str, result: Result<(), TransactionError>) {
        match result {
            Ok(()) => {
                if self.status == ActuatorStatus::Degraded {
                    info!(
                        "Joint '{}' (servo {}) recovered after {} failed transactions",
                        self.config.joint_name, self.id, self.consecutive_failures
                    );
                }
                self.consecutive_failures = 0;
                self.status = ActuatorStatus::Ready;
            },
            Err(e) => {
                self.consecutive_failures += 1;
                if self.status == ActuatorStatus::Degraded {
                    debug!(
                        "Joint '{}' (servo {}) {} failed again: {}",
                        self.config.joint_name, self.id, what, e
                    );
                } else {
                    warn!(
                        "Joint '{}' (servo {}) degraded, {} failed: {}",
                        self.config.joint_name, self.id, what, e
                    );
                }
                self.status = ActuatorStatus::Degraded;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CurrentReadPolicy;
    use kondo_protocol::{CNT_PULSE, MAX_PULSE, RADIAN_PER_PULSE};
    use kondo_serial::mock::{MockLink, ServoBus};

    fn servo_bus(ids: &[u8]) -> (Bus<MockLink>, MockLink, std::sync::Arc<parking_lot::Mutex<ServoBus>>) {
        let servos = ServoBus::shared(ids);
        let link = MockLink::with_servos(servos.clone());
        let handle = link.clone();
        (Bus::new(link), handle, servos)
    }

    #[test]
    fn test_new_is_unconfigured() {
        let actuator = Actuator::new(ActuatorConfig::new(4, "hip")).unwrap();
        assert_eq!(actuator.status(), ActuatorStatus::Unconfigured);
        assert_eq!(actuator.id().get(), 4);
        assert_eq!(actuator.name(), "hip");
    }

    #[test]
    fn test_configure_pushes_tunables() {
        let (bus, handle, servos) = servo_bus(&[2]);
        let config = ActuatorConfig::new(2, "elbow")
            .with_stretch(40)
            .with_speed(90)
            .with_current_limit(20)
            .with_temperature_limit(70);
        let mut actuator = Actuator::new(config).unwrap();

        let failed = actuator.configure(&bus);
        assert!(failed.is_empty());
        assert_eq!(actuator.status(), ActuatorStatus::Ready);
        assert_eq!(handle.writes().len(), 4);

        let servo = servos.lock().servo(2).cloned().unwrap();
        assert_eq!(servo.stretch, 40);
        assert_eq!(servo.speed, 90);
        assert_eq!(servo.current_limit, 20);
        assert_eq!(servo.temperature_limit, 70);
        assert_eq!(
            actuator.applied(),
            AppliedParams {
                stretch: Some(40),
                speed: Some(90),
                current_limit: Some(20),
                temperature_limit: Some(70),
            }
        );
    }

    #[test]
    fn test_configure_failure_keeps_previous_value() {
        let (bus, _handle, servos) = servo_bus(&[2]);
        servos.lock().fail(2);
        let mut actuator = Actuator::new(ActuatorConfig::new(2, "elbow").with_speed(90)).unwrap();

        let failed = actuator.configure(&bus);
        assert_eq!(failed, vec![ParamKind::Speed]);
        assert_eq!(actuator.applied().speed, None);
        assert_eq!(actuator.status(), ActuatorStatus::Degraded);
    }

    #[test]
    fn test_tick_moves_and_reports_achieved_position() {
        let (bus, _handle, servos) = servo_bus(&[1]);
        let mut actuator = Actuator::new(ActuatorConfig::new(1, "j1")).unwrap();
        actuator.configure(&bus);

        let state = actuator.tick(&bus, JointCommand::powered(0.5));
        assert_eq!(actuator.status(), ActuatorStatus::Ready);
        assert!((state.position - 0.5).abs() <= RADIAN_PER_PULSE);
        assert_eq!(state.velocity, 0.0);
        assert!(state.power_enabled);
        assert_eq!(servos.lock().servo(1).unwrap().pulse, radian_to_pulse(0.5));
    }

    #[test]
    fn test_tick_clamps_to_bounds() {
        let (bus, _handle, servos) = servo_bus(&[1]);
        let mut actuator =
            Actuator::new(ActuatorConfig::new(1, "j1").with_bounds(-30.0, 30.0)).unwrap();

        let state = actuator.tick(&bus, JointCommand::powered(2.0));
        assert_eq!(state.commanded, 30f64.to_radians());
        assert_eq!(
            servos.lock().servo(1).unwrap().pulse,
            radian_to_pulse(30f64.to_radians())
        );

        let state = actuator.tick(&bus, JointCommand::powered(-2.0));
        assert_eq!(state.commanded, (-30f64).to_radians());
    }

    #[test]
    fn test_tick_power_off_frees_and_keeps_position() {
        let (bus, handle, servos) = servo_bus(&[1]);
        let mut actuator = Actuator::new(ActuatorConfig::new(1, "j1")).unwrap();
        let before = actuator.tick(&bus, JointCommand::powered(0.2)).position;

        let state = actuator.tick(&bus, JointCommand::new(1.0, false));
        assert_eq!(state.position, before);
        assert_eq!(state.effort, 0.0);
        assert!(!state.power_enabled);
        assert!(servos.lock().servo(1).unwrap().free);
        assert_eq!(handle.writes().last().unwrap(), &vec![0x81, 0, 0]);
    }

    #[test]
    fn test_tick_power_off_skip_command() {
        let (bus, handle, _servos) = servo_bus(&[1]);
        let config = ActuatorConfig::new(1, "j1").with_power_off(PowerOffBehavior::SkipCommand);
        let mut actuator = Actuator::new(config).unwrap();

        actuator.tick(&bus, JointCommand::off());
        assert_eq!(handle.interactions(), 0);
    }

    #[test]
    fn test_tick_reads_current_per_policy() {
        let (bus, handle, servos) = servo_bus(&[1]);
        servos.lock().servo_mut(1).unwrap().current = 100;
        let config = ActuatorConfig::new(1, "j1").with_current_read(CurrentReadPolicy::Every(2));
        let mut actuator = Actuator::new(config).unwrap();

        let state = actuator.tick(&bus, JointCommand::powered(0.0));
        assert_eq!(state.effort, -36.0);
        assert_eq!(handle.writes().len(), 2);

        servos.lock().servo_mut(1).unwrap().current = 30;
        let state = actuator.tick(&bus, JointCommand::powered(0.0));
        assert_eq!(state.effort, -36.0);
        assert_eq!(handle.writes().len(), 3);

        let state = actuator.tick(&bus, JointCommand::powered(0.0));
        assert_eq!(state.effort, 30.0);
    }

    #[test]
    fn test_degraded_retains_state_and_recovers() {
        let (bus, _handle, servos) = servo_bus(&[1]);
        let mut actuator = Actuator::new(ActuatorConfig::new(1, "j1")).unwrap();
        let good = actuator.tick(&bus, JointCommand::powered(0.4));

        servos.lock().fail(1);
        let state = actuator.tick(&bus, JointCommand::powered(-0.4));
        assert_eq!(actuator.status(), ActuatorStatus::Degraded);
        assert_eq!(state.position, good.position);
        assert_eq!(actuator.consecutive_failures(), 1);

        servos.lock().faults.clear();
        let state = actuator.tick(&bus, JointCommand::powered(-0.4));
        assert_eq!(actuator.status(), ActuatorStatus::Ready);
        assert!((state.position + 0.4).abs() <= RADIAN_PER_PULSE);
        assert_eq!(actuator.consecutive_failures(), 0);
    }

    #[test]
    fn test_loopback_tick_has_no_link_interactions() {
        let (bus, handle, _servos) = servo_bus(&[]);
        let mut actuator =
            Actuator::new(ActuatorConfig::new(9, "sim").with_loopback(true).with_speed(50)).unwrap();
        assert!(actuator.configure(&bus).is_empty());
        assert_eq!(actuator.applied().speed, Some(50));

        let state = actuator.tick(&bus, JointCommand::powered(0.3));
        assert_eq!(state.position, 0.3);
        assert_eq!(state.effort, 0.0);

        let state = actuator.tick(&bus, JointCommand::new(-0.3, false));
        assert_eq!(state.position, 0.3);
        assert_eq!(handle.interactions(), 0);
    }

    #[test]
    fn test_nan_command_keeps_previous_target() {
        let (bus, _handle, servos) = servo_bus(&[1]);
        let mut actuator = Actuator::new(ActuatorConfig::new(1, "j1")).unwrap();
        actuator.tick(&bus, JointCommand::powered(0.1));
        let state = actuator.tick(&bus, JointCommand::powered(f64::NAN));
        assert_eq!(state.commanded, 0.1);
        assert_ne!(servos.lock().servo(1).unwrap().pulse, CNT_PULSE);
        assert!(servos.lock().servo(1).unwrap().pulse < MAX_PULSE);
    }
}
