//! run 命令
//!
//! 从 TOML 配置注册关节，按固定周期运行控制循环，Ctrl-C 停止。
//! 停止后发送一次断电命令，然后关闭链路。

use anyhow::{Context, Result};
use clap::Args;
use kondo_driver::{
    JointCommand, JointState, KondoDriver, KondoDriverBuilder, LoopConfig, LoopStats, run_loop,
};
use kondo_serial::{IcsLink, NullLink};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use crate::config::RunConfig;
use crate::utils::LinkArgs;

#[derive(Args, Debug)]
pub struct RunCommand {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 所有关节强制 loopback（不打开硬件）
    #[arg(long)]
    pub loopback: bool,

    /// 迭代次数（默认运行到 Ctrl-C）
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// 正弦摆动幅度（度，0 表示保持中点）
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub amplitude: f64,

    /// 正弦摆动频率（Hz）
    #[arg(long, default_value_t = 0.2)]
    pub frequency: f64,
}

impl RunCommand {
    pub fn execute(&self, link: &LinkArgs) -> Result<()> {
        let mut config = RunConfig::load(&self.config)?;
        if self.loopback {
            config.link.loopback = true;
        }
        if link.port.is_some() {
            config.link.port = link.port.clone();
        }
        if config.link.loopback {
            for actuator in &mut config.actuators {
                actuator.loopback = true;
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let handler_stop = stop.clone();
        ctrlc::set_handler(move || {
            handler_stop.store(true, Ordering::SeqCst);
        })
        .context("failed to install Ctrl-C handler")?;

        let builder = KondoDriverBuilder::new()
            .link_params(config.link.params())
            .actuators(config.actuators.clone())
            .strict(true);

        let stats = if config.needs_hardware() {
            let driver = builder.build().context("failed to start driver")?;
            self.drive(driver, &config, &stop)
        } else {
            info!("All actuators are loopback, no hardware opened");
            let driver = builder.build_with_link(NullLink).context("failed to start driver")?;
            self.drive(driver, &config, &stop)
        };

        println!(
            "iterations: {}, overruns: {}, degraded cycles: {}, slowest update: {:?}",
            stats.iterations, stats.overruns, stats.degraded_cycles, stats.max_update
        );
        Ok(())
    }

    fn loop_config(&self, config: &RunConfig) -> LoopConfig {
        LoopConfig {
            period: config.link.period(),
            max_iterations: self.iterations,
        }
    }

    /// 运行循环并在结束时断电
    pub fn drive<L: IcsLink>(
        &self,
        mut driver: KondoDriver<L>,
        config: &RunConfig,
        stop: &AtomicBool,
    ) -> LoopStats {
        let loop_config = self.loop_config(config);
        let period = loop_config.period.as_secs_f64();
        let amplitude = self.amplitude.to_radians();
        let omega = 2.0 * std::f64::consts::PI * self.frequency;

        let stats = run_loop(
            &mut driver,
            |iteration: u64, states: &[JointState]| {
                let angle = amplitude * (omega * iteration as f64 * period).sin();
                vec![JointCommand::powered(angle); states.len()]
            },
            &loop_config,
            stop,
        );

        for joint in driver.joint_states() {
            println!(
                "{:>12} (id {:>2}): {:>8.2}°  effort {:>5.1}  {:?}",
                joint.name,
                joint.id,
                joint.position.to_degrees(),
                joint.effort,
                joint.status
            );
        }

        driver.set_commands(&vec![JointCommand::off(); driver.len()]);
        driver.update();
        driver.close();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kondo_driver::ActuatorConfig;
    use kondo_serial::mock::{MockLink, ServoBus};

    fn command(iterations: u64, amplitude: f64) -> RunCommand {
        RunCommand {
            config: PathBuf::from("unused.toml"),
            loopback: false,
            iterations: Some(iterations),
            amplitude,
            frequency: 1.0,
        }
    }

    fn run_config(actuators: Vec<ActuatorConfig>) -> RunConfig {
        let mut config = RunConfig {
            actuators,
            ..RunConfig::default()
        };
        config.link.period_ms = 1;
        config
    }

    #[test]
    fn test_drive_loopback_runs_iterations() {
        let config = run_config(vec![
            ActuatorConfig::new(1, "a").with_loopback(true),
            ActuatorConfig::new(2, "b").with_loopback(true),
        ]);
        let driver = KondoDriverBuilder::new()
            .actuators(config.actuators.clone())
            .build_with_link(NullLink)
            .unwrap();

        let stop = AtomicBool::new(false);
        let stats = command(10, 20.0).drive(driver, &config, &stop);
        assert_eq!(stats.iterations, 10);
        assert_eq!(stats.degraded_cycles, 0);
    }

    #[test]
    fn test_drive_frees_servos_on_exit() {
        let servos = ServoBus::shared(&[1]);
        let link = MockLink::with_servos(servos.clone());
        let handle = link.clone();
        let config = run_config(vec![ActuatorConfig::new(1, "a")]);
        let driver = KondoDriverBuilder::new()
            .actuators(config.actuators.clone())
            .build_with_link(link)
            .unwrap();

        let stop = AtomicBool::new(false);
        let stats = command(3, 0.0).drive(driver, &config, &stop);
        assert_eq!(stats.iterations, 3);
        assert!(servos.lock().servo(1).unwrap().free);
        assert_eq!(handle.close_count(), 1);
    }
}
