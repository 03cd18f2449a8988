//! flag / clear-flags 命令
//!
//! 模式标志（slave / wheel / pwminh / free / reverse）的读取与修改

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use kondo_driver::{Bus, diagnostics};
use kondo_protocol::{ModeFlag, ServoId};
use kondo_serial::IcsLink;

use crate::utils::{LinkArgs, parse_servo_id};

#[derive(Args, Debug, Clone, Copy)]
pub struct FlagTarget {
    /// 舵机 ID
    #[arg(value_parser = parse_servo_id)]
    pub id: ServoId,

    /// 标志名（slave / wheel / pwminh / free / reverse）
    pub flag: ModeFlag,
}

#[derive(Subcommand, Debug)]
pub enum FlagCommand {
    /// 读取标志
    Get(FlagTarget),
    /// 置位标志
    Set(FlagTarget),
    /// 清除标志
    Clear(FlagTarget),
}

impl FlagCommand {
    pub fn execute(&self, link: &LinkArgs) -> Result<()> {
        let bus = link.open_bus()?;
        let value = self.run(&bus)?;
        let target = self.target();
        println!("servo {} {}: {}", target.id, target.flag, if value { "on" } else { "off" });
        Ok(())
    }

    fn target(&self) -> FlagTarget {
        match self {
            FlagCommand::Get(t) | FlagCommand::Set(t) | FlagCommand::Clear(t) => *t,
        }
    }

    /// 返回执行后的标志状态
    pub fn run<L: IcsLink>(&self, bus: &Bus<L>) -> Result<bool> {
        let FlagTarget { id, flag } = self.target();
        let value = match self {
            FlagCommand::Get(_) => diagnostics::read_flag(bus, id, flag),
            FlagCommand::Set(_) => diagnostics::set_flag(bus, id, flag).map(|image| image.flag(flag)),
            FlagCommand::Clear(_) => {
                diagnostics::clear_flag(bus, id, flag).map(|image| image.flag(flag))
            },
        };
        value.with_context(|| format!("flag {flag} on servo {id} failed"))
    }
}

#[derive(Args, Debug)]
pub struct ClearFlagsCommand {
    /// 舵机 ID
    #[arg(value_parser = parse_servo_id)]
    pub id: ServoId,
}

impl ClearFlagsCommand {
    pub fn execute(&self, link: &LinkArgs) -> Result<()> {
        let bus = link.open_bus()?;
        let flags = self.run(&bus)?;
        println!("servo {} flags: 0x{:02X}", self.id, flags);
        Ok(())
    }

    /// 返回清除后的标志字节
    pub fn run<L: IcsLink>(&self, bus: &Bus<L>) -> Result<u8> {
        let image = diagnostics::clear_all_flags(bus, self.id)
            .with_context(|| format!("failed to clear flags on servo {}", self.id))?;
        Ok(image.flag_byte())
    }
}
