//! 命令定义和实现
//!
//! 单舵机命令都拆成两步：`execute()` 打开链路，`run()` 在给定的总线上执行，
//! 测试直接对 Mock 总线调用 `run()`。

pub mod eeprom;
pub mod flag;
pub mod id;
pub mod motion;
pub mod param;
pub mod run;

pub use eeprom::EepromCommand;
pub use flag::{ClearFlagsCommand, FlagCommand};
pub use id::IdCommand;
pub use motion::{FreeCommand, HoldCommand, MoveCommand};
pub use param::ParamCommand;
pub use run::RunCommand;
