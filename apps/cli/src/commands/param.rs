//! param 命令
//!
//! 单字节参数：stretch / speed / current / temperature

use anyhow::{Context, Result};
use clap::Subcommand;
use kondo_driver::{Bus, diagnostics};
use kondo_protocol::{ParamKind, ServoId};
use kondo_serial::IcsLink;

use crate::utils::{LinkArgs, parse_servo_id};

#[derive(Subcommand, Debug)]
pub enum ParamCommand {
    /// 读取参数
    Get {
        #[arg(value_parser = parse_servo_id)]
        id: ServoId,
        /// stretch / speed / current / temperature
        param: ParamKind,
    },
    /// 写入参数（0-127）
    Set {
        #[arg(value_parser = parse_servo_id)]
        id: ServoId,
        param: ParamKind,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=127))]
        value: u8,
    },
}

impl ParamCommand {
    pub fn execute(&self, link: &LinkArgs) -> Result<()> {
        let bus = link.open_bus()?;
        let value = self.run(&bus)?;
        let (id, param) = match self {
            ParamCommand::Get { id, param } | ParamCommand::Set { id, param, .. } => (id, param),
        };
        println!("servo {id} {param}: {value}");
        Ok(())
    }

    pub fn run<L: IcsLink>(&self, bus: &Bus<L>) -> Result<u8> {
        match *self {
            ParamCommand::Get { id, param } => diagnostics::read_param(bus, id, param)
                .with_context(|| format!("failed to read {param} from servo {id}")),
            ParamCommand::Set { id, param, value } => {
                diagnostics::write_param(bus, id, param, value)
                    .with_context(|| format!("failed to write {param}={value} to servo {id}"))
            },
        }
    }
}
