//! Kondo 驱动
//!
//! 独占一条 ICS 链路，按注册顺序管理所有关节。对外暴露的是纯数据接口：
//! 外部调度器通过 [`KondoDriver::set_command`] 写入命令，调用
//! [`KondoDriver::update`] 执行一个周期，再用 [`KondoDriver::joint_states`] 读回状态。

use crate::actuator::{Actuator, ActuatorState, ActuatorStatus, JointCommand};
use crate::bus::Bus;
use crate::config::ActuatorConfig;
use crate::error::{ConfigError, DriverError};
use crate::metrics::BusMetricsSnapshot;
use kondo_protocol::{ParamKind, ServoId};
use kondo_serial::{IcsLink, LinkParams, SerialLink};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 默认控制周期
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

/// 关节定位方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointRef<'a> {
    /// 注册顺序中的序号
    Index(usize),
    Id(ServoId),
    Name(&'a str),
}

impl From<usize> for JointRef<'_> {
    fn from(index: usize) -> Self {
        JointRef::Index(index)
    }
}

impl From<ServoId> for JointRef<'_> {
    fn from(id: ServoId) -> Self {
        JointRef::Id(id)
    }
}

impl<'a> From<&'a str> for JointRef<'a> {
    fn from(name: &'a str) -> Self {
        JointRef::Name(name)
    }
}

impl fmt::Display for JointRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JointRef::Index(i) => write!(f, "#{i}"),
            JointRef::Id(id) => write!(f, "servo {id}"),
            JointRef::Name(name) => write!(f, "'{name}'"),
        }
    }
}

/// 外部调度器读取的关节状态
#[derive(Debug, Clone, PartialEq)]
pub struct JointState {
    pub name: String,
    pub id: ServoId,
    /// 弧度
    pub position: f64,
    /// 恒为 0
    pub velocity: f64,
    pub effort: f64,
    pub status: ActuatorStatus,
}

/// 注册结果
#[derive(Debug, Default)]
pub struct RegistrationReport {
    /// 成功注册的舵机（按注册顺序）
    pub registered: Vec<ServoId>,
    /// 被拒绝的配置：(关节名, 原因)
    pub rejected: Vec<(String, ConfigError)>,
    /// 初始参数下发失败（不影响注册）
    pub failed_params: Vec<(ServoId, ParamKind)>,
}

impl RegistrationReport {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// 一次 `update()` 的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub ticked: usize,
    /// 本周期处于 Degraded 的舵机
    pub degraded: Vec<ServoId>,
    pub elapsed: Duration,
}

impl UpdateReport {
    pub fn all_ready(&self) -> bool {
        self.degraded.is_empty()
    }
}

/// Kondo ICS 驱动
pub struct KondoDriver<L: IcsLink> {
    bus: Arc<Bus<L>>,
    actuators: Vec<Actuator>,
    commands: Vec<JointCommand>,
    by_id: HashMap<ServoId, usize>,
    closed: bool,
}

impl KondoDriver<SerialLink> {
    /// 打开 USB 串口链路并创建驱动
    ///
    /// # Errors
    /// - `DriverError::Link`: 找不到适配器或端口配置失败，此时不会创建驱动
    pub fn open(params: &LinkParams) -> Result<Self, DriverError> {
        let link = SerialLink::open_with(params)?;
        Ok(Self::new(link))
    }
}

impl<L: IcsLink> KondoDriver<L> {
    /// 使用已打开的链路创建驱动
    pub fn new(link: L) -> Self {
        info!("Kondo driver created (link open: {})", link.is_open());
        Self {
            bus: Arc::new(Bus::new(link)),
            actuators: Vec::new(),
            commands: Vec::new(),
            by_id: HashMap::new(),
            closed: false,
        }
    }

    /// 批量注册关节
    ///
    /// 每个配置独立校验；同一批次内重复的 ID，以及与已注册关节冲突的 ID，
    /// 对应的配置全部拒绝（`ConfigError::DuplicateId`）。其余配置按顺序下发初始参数并追加。
    pub fn register(
        &mut self,
        configs: impl IntoIterator<Item = ActuatorConfig>,
    ) -> RegistrationReport {
        let configs: Vec<ActuatorConfig> = configs.into_iter().collect();
        let mut occurrences: HashMap<u8, usize> = HashMap::new();
        for config in &configs {
            *occurrences.entry(config.id).or_default() += 1;
        }

        let mut report = RegistrationReport::default();
        for config in configs {
            let joint = config.joint_name.clone();
            let mut actuator = match Actuator::new(config) {
                Ok(actuator) => actuator,
                Err(e) => {
                    warn!("Rejected joint '{}': {}", joint, e);
                    report.rejected.push((joint, e));
                    continue;
                },
            };

            let id = actuator.id();
            let duplicated = occurrences.get(&id.get()).copied().unwrap_or(0) > 1;
            if duplicated || self.by_id.contains_key(&id) {
                let e = ConfigError::DuplicateId { id: id.get() };
                warn!("Rejected joint '{}': {}", joint, e);
                report.rejected.push((joint, e));
                continue;
            }

            for param in actuator.configure(&*self.bus) {
                report.failed_params.push((id, param));
            }
            self.by_id.insert(id, self.actuators.len());
            self.actuators.push(actuator);
            self.commands.push(JointCommand::default());
            report.registered.push(id);
        }

        info!(
            "Registered {} joints ({} rejected, {} total)",
            report.registered.len(),
            report.rejected.len(),
            self.actuators.len()
        );
        report
    }

    /// 注册单个关节
    ///
    /// # Errors
    /// - `DriverError::Config`: 配置非法或 ID 重复
    pub fn register_one(&mut self, config: ActuatorConfig) -> Result<ServoId, DriverError> {
        let joint = config.joint_name.clone();
        let mut report = self.register([config]);
        if let Some((_, e)) = report.rejected.pop() {
            return Err(e.into());
        }
        report
            .registered
            .pop()
            .ok_or(DriverError::UnknownJoint(joint))
    }

    fn resolve(&self, joint: JointRef<'_>) -> Result<usize, DriverError> {
        let index = match joint {
            JointRef::Index(i) => (i < self.actuators.len()).then_some(i),
            JointRef::Id(id) => self.by_id.get(&id).copied(),
            JointRef::Name(name) => self.actuators.iter().position(|a| a.name() == name),
        };
        index.ok_or_else(|| DriverError::UnknownJoint(joint.to_string()))
    }

    /// 设置某个关节下一周期的命令
    ///
    /// # Errors
    /// - `DriverError::UnknownJoint`
    pub fn set_command<'a>(
        &mut self,
        joint: impl Into<JointRef<'a>>,
        command: JointCommand,
    ) -> Result<(), DriverError> {
        let index = self.resolve(joint.into())?;
        self.commands[index] = command;
        Ok(())
    }

    /// 按注册顺序设置所有关节的命令（多余的命令被忽略）
    pub fn set_commands(&mut self, commands: &[JointCommand]) {
        for (slot, command) in self.commands.iter_mut().zip(commands) {
            *slot = *command;
        }
    }

    pub fn command<'a>(&self, joint: impl Into<JointRef<'a>>) -> Result<JointCommand, DriverError> {
        Ok(self.commands[self.resolve(joint.into())?])
    }

    /// 执行一个控制周期
    ///
    /// 按注册顺序依次 tick 每个关节；任何关节失败都不会中断其余关节的更新。
    pub fn update(&mut self) -> UpdateReport {
        let start = Instant::now();
        let bus = &*self.bus;
        let mut degraded = Vec::new();

        for (actuator, command) in self.actuators.iter_mut().zip(&self.commands) {
            actuator.tick(bus, *command);
            if actuator.status() == ActuatorStatus::Degraded {
                degraded.push(actuator.id());
            }
        }

        UpdateReport {
            ticked: self.actuators.len(),
            degraded,
            elapsed: start.elapsed(),
        }
    }

    pub fn joint_states(&self) -> Vec<JointState> {
        self.actuators
            .iter()
            .map(|a| {
                let state = a.state();
                JointState {
                    name: a.name().to_string(),
                    id: a.id(),
                    position: state.position,
                    velocity: state.velocity,
                    effort: state.effort,
                    status: a.status(),
                }
            })
            .collect()
    }

    pub fn actuator_state<'a>(
        &self,
        joint: impl Into<JointRef<'a>>,
    ) -> Result<ActuatorState, DriverError> {
        Ok(self.actuators[self.resolve(joint.into())?].state())
    }

    pub fn actuators(&self) -> &[Actuator] {
        &self.actuators
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    /// 共享的事务引擎，可供诊断工具在其他线程中使用
    pub fn bus(&self) -> Arc<Bus<L>> {
        Arc::clone(&self.bus)
    }

    pub fn metrics(&self) -> BusMetricsSnapshot {
        self.bus.metrics().snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 关闭链路（只执行一次，重复调用无效果）
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.bus.close();
        info!(
            "Kondo driver closed ({} joints, {:?})",
            self.actuators.len(),
            self.metrics()
        );
    }
}

impl<L: IcsLink> Drop for KondoDriver<L> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kondo_serial::NullLink;
    use kondo_serial::mock::{MockLink, ServoBus};

    fn mock_driver(ids: &[u8]) -> (KondoDriver<MockLink>, MockLink) {
        let link = MockLink::with_servos(ServoBus::shared(ids));
        let handle = link.clone();
        (KondoDriver::new(link), handle)
    }

    #[test]
    fn test_register_in_order() {
        let (mut driver, _) = mock_driver(&[1, 2, 3]);
        let report = driver.register([
            ActuatorConfig::new(3, "c"),
            ActuatorConfig::new(1, "a"),
            ActuatorConfig::new(2, "b"),
        ]);
        assert!(report.is_complete());
        let names: Vec<_> = driver.joint_states().into_iter().map(|j| j.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_register_rejects_invalid_config_only() {
        let (mut driver, _) = mock_driver(&[1]);
        let report = driver.register([
            ActuatorConfig::new(1, "ok"),
            ActuatorConfig::new(2, "bad").with_bounds(5.0, -5.0),
        ]);
        assert_eq!(report.registered.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, "bad");
    }

    #[test]
    fn test_register_rejects_existing_id() {
        let (mut driver, _) = mock_driver(&[1]);
        driver.register_one(ActuatorConfig::new(1, "a")).unwrap();
        let err = driver.register_one(ActuatorConfig::new(1, "b")).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Config(ConfigError::DuplicateId { id: 1 })
        ));
        assert_eq!(driver.len(), 1);
    }

    #[test]
    fn test_set_command_by_index_id_and_name() {
        let (mut driver, _) = mock_driver(&[1, 2]);
        driver.register([ActuatorConfig::new(1, "a"), ActuatorConfig::new(2, "b")]);

        driver.set_command(0usize, JointCommand::powered(0.1)).unwrap();
        driver
            .set_command(ServoId::new(2).unwrap(), JointCommand::powered(0.2))
            .unwrap();
        driver.set_command("a", JointCommand::powered(0.3)).unwrap();

        assert_eq!(
            driver.command(JointRef::Index(0)).unwrap(),
            JointCommand::powered(0.3)
        );
        assert_eq!(
            driver.command(JointRef::Name("b")).unwrap(),
            JointCommand::powered(0.2)
        );
        assert!(matches!(
            driver.set_command("missing", JointCommand::off()),
            Err(DriverError::UnknownJoint(_))
        ));
        assert!(driver.set_command(5usize, JointCommand::off()).is_err());
    }

    #[test]
    fn test_update_reports_ticked_and_states() {
        let (mut driver, _) = mock_driver(&[1, 2]);
        driver.register([ActuatorConfig::new(1, "a"), ActuatorConfig::new(2, "b")]);
        driver.set_commands(&[JointCommand::powered(0.25), JointCommand::powered(-0.25)]);

        let report = driver.update();
        assert_eq!(report.ticked, 2);
        assert!(report.all_ready());

        let states = driver.joint_states();
        assert!((states[0].position - 0.25).abs() < 1e-3);
        assert!((states[1].position + 0.25).abs() < 1e-3);
        assert!(states.iter().all(|s| s.velocity == 0.0));
    }

    #[test]
    fn test_close_once_and_on_drop() {
        let (mut driver, handle) = mock_driver(&[]);
        driver.close();
        driver.close();
        assert!(driver.is_closed());
        drop(driver);
        assert_eq!(handle.close_count(), 1);

        let (driver, handle) = mock_driver(&[]);
        drop(driver);
        assert_eq!(handle.close_count(), 1);
    }

    #[test]
    fn test_close_without_open_link() {
        let mut driver = KondoDriver::new(NullLink);
        driver.close();
        assert!(driver.is_closed());
    }
}
