//! # Kondo CLI
//!
//! Kondo ICS 舵机的命令行工具：单舵机诊断 + 参考控制循环。
//!
//! ```bash
//! # 读取 EEPROM（默认 Dual USB Adapter HS，PID 0006）
//! kondo-cli eeprom 1
//!
//! # 旧款适配器
//! kondo-cli --product-id 0008 flag set 1 reverse
//!
//! # 单舵机移动 / 脱力 / 保持
//! kondo-cli move 1 -45
//! kondo-cli free 1
//! kondo-cli hold 1
//!
//! # 从配置文件运行控制循环
//! kondo-cli run --config robot.toml --iterations 1000
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod utils;

use commands::{
    ClearFlagsCommand, EepromCommand, FlagCommand, FreeCommand, HoldCommand, IdCommand,
    MoveCommand, ParamCommand, RunCommand,
};
use utils::LinkArgs;

/// Kondo CLI - ICS 舵机命令行工具
#[derive(Parser, Debug)]
#[command(name = "kondo-cli")]
#[command(about = "Command-line diagnostics and control for Kondo ICS servos", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    link: LinkArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 读取 EEPROM
    Eeprom {
        #[command(flatten)]
        args: EepromCommand,
    },

    /// 模式标志读写
    #[command(subcommand)]
    Flag(FlagCommand),

    /// 清除全部模式标志
    ClearFlags {
        #[command(flatten)]
        args: ClearFlagsCommand,
    },

    /// 参数读写
    #[command(subcommand)]
    Param(ParamCommand),

    /// ID 读写（总线上只能有一个舵机）
    #[command(subcommand)]
    Id(IdCommand),

    /// 移动到指定角度
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 脱力
    Free {
        #[command(flatten)]
        args: FreeCommand,
    },

    /// 在当前位置保持
    Hold {
        #[command(flatten)]
        args: HoldCommand,
    },

    /// 运行控制循环
    Run {
        #[command(flatten)]
        args: RunCommand,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kondo_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let link = &cli.link;

    match &cli.command {
        Commands::Eeprom { args } => args.execute(link),
        Commands::Flag(cmd) => cmd.execute(link),
        Commands::ClearFlags { args } => args.execute(link),
        Commands::Param(cmd) => cmd.execute(link),
        Commands::Id(cmd) => cmd.execute(link),
        Commands::Move { args } => args.execute(link),
        Commands::Free { args } => args.execute(link),
        Commands::Hold { args } => args.execute(link),
        Commands::Run { args } => args.execute(link),
    }
}
