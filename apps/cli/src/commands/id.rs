//! id 命令
//!
//! ID 读写没有目标地址，总线上必须只连接一个舵机

use anyhow::{Context, Result};
use clap::Subcommand;
use kondo_driver::{Bus, diagnostics};
use kondo_protocol::ServoId;
use kondo_serial::IcsLink;

use crate::utils::{LinkArgs, parse_servo_id};

#[derive(Subcommand, Debug)]
pub enum IdCommand {
    /// 读取舵机 ID
    Get,
    /// 写入新 ID
    Set {
        #[arg(value_parser = parse_servo_id)]
        new: ServoId,
    },
}

impl IdCommand {
    pub fn execute(&self, link: &LinkArgs) -> Result<()> {
        let bus = link.open_bus()?;
        let id = self.run(&bus)?;
        println!("servo id: {id}");
        Ok(())
    }

    pub fn run<L: IcsLink>(&self, bus: &Bus<L>) -> Result<ServoId> {
        match self {
            IdCommand::Get => diagnostics::read_id(bus)
                .context("failed to read servo id (is exactly one servo connected?)"),
            IdCommand::Set { new } => diagnostics::write_id(bus, *new)
                .with_context(|| format!("failed to set servo id to {new}")),
        }
    }
}
