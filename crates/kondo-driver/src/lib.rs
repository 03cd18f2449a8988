//! # Kondo Driver
//!
//! Kondo ICS 舵机链的驱动层：
//! - 事务引擎（[`Bus`]）：同一链路上同一时刻只有一个事务
//! - 关节状态机（[`Actuator`]）：角度钳位、单位换算、`Ready`/`Degraded`
//! - 驱动（[`KondoDriver`]）：独占链路，按注册顺序更新全部关节
//! - 诊断操作（[`diagnostics`]）：EEPROM、模式标志、ID 读写
//! - 参考控制循环（[`control_loop`]）
//!
//! # 使用场景
//!
//! ```no_run
//! use kondo_driver::{ActuatorConfig, JointCommand, KondoDriverBuilder};
//!
//! let mut driver = KondoDriverBuilder::new()
//!     .actuator(ActuatorConfig::new(1, "pan").with_bounds(-90.0, 90.0))
//!     .build()
//!     .unwrap();
//!
//! driver.set_command("pan", JointCommand::powered(0.3)).unwrap();
//! let report = driver.update();
//! for joint in driver.joint_states() {
//!     println!("{}: {:.3} rad (effort {})", joint.name, joint.position, joint.effort);
//! }
//! # let _ = report;
//! ```

mod actuator;
mod builder;
mod bus;
mod config;
pub mod control_loop;
pub mod diagnostics;
mod driver;
mod error;
pub mod metrics;

pub use actuator::{Actuator, ActuatorState, ActuatorStatus, AppliedParams, JointCommand};
pub use builder::KondoDriverBuilder;
pub use bus::{Bus, BusSession};
pub use config::{
    ActuatorConfig, CurrentReadPolicy, DEFAULT_MAX_ANGLE, DEFAULT_MIN_ANGLE, PowerOffBehavior,
};
pub use control_loop::{CommandSource, LoopConfig, LoopStats, run_loop};
pub use driver::{
    DEFAULT_PERIOD, JointRef, JointState, KondoDriver, RegistrationReport, UpdateReport,
};
pub use error::{ConfigError, DriverError, TransactionError};
pub use metrics::{BusMetrics, BusMetricsSnapshot};

pub use kondo_protocol as protocol;
pub use kondo_serial as serial;
