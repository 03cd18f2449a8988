//! 固定周期控制循环
//!
//! 供没有外部调度器的场景使用（如 `kondo-cli run`）：每个周期从命令源取命令，
//! 调用 [`KondoDriver::update`]，然后睡眠到下一个锚点。
//!
//! - **精确定时**: 使用 `spin_sleep` 实现低抖动延时
//! - **Overrun 处理**: 周期超时时不睡眠，并把锚点重置到当前时间
//! - **停止**: 外部置位 `stop` 或达到 `max_iterations`

use crate::actuator::JointCommand;
use crate::driver::{DEFAULT_PERIOD, JointState, KondoDriver};
use kondo_serial::IcsLink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 控制循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// 控制周期（默认 10ms）
    pub period: Duration,
    /// 最大迭代次数（None 表示运行到 `stop` 被置位）
    pub max_iterations: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            max_iterations: None,
        }
    }
}

/// 每个周期提供关节命令（按注册顺序）
pub trait CommandSource {
    fn next_commands(&mut self, iteration: u64, states: &[JointState]) -> Vec<JointCommand>;
}

impl<F> CommandSource for F
where
    F: FnMut(u64, &[JointState]) -> Vec<JointCommand>,
{
    fn next_commands(&mut self, iteration: u64, states: &[JointState]) -> Vec<JointCommand> {
        self(iteration, states)
    }
}

/// 循环统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub iterations: u64,
    /// `update()` 耗时超过周期的次数
    pub overruns: u64,
    /// 至少有一个关节处于 Degraded 的周期数
    pub degraded_cycles: u64,
    pub max_update: Duration,
}

/// 运行控制循环（阻塞）
pub fn run_loop<L, S>(
    driver: &mut KondoDriver<L>,
    mut source: S,
    config: &LoopConfig,
    stop: &AtomicBool,
) -> LoopStats
where
    L: IcsLink,
    S: CommandSource,
{
    let period = config.period;
    let mut stats = LoopStats::default();
    let mut next_tick = Instant::now();

    loop {
        if stop.load(Ordering::Relaxed) {
            debug!("Control loop stopped after {} iterations", stats.iterations);
            break;
        }
        if let Some(max) = config.max_iterations
            && stats.iterations >= max
        {
            break;
        }

        let states = driver.joint_states();
        let commands = source.next_commands(stats.iterations, &states);
        driver.set_commands(&commands);

        let report = driver.update();
        stats.iterations += 1;
        stats.max_update = stats.max_update.max(report.elapsed);
        if !report.all_ready() {
            stats.degraded_cycles += 1;
        }

        next_tick += period;
        let now = Instant::now();
        if next_tick > now {
            spin_sleep::sleep(next_tick - now);
        } else {
            stats.overruns += 1;
            if stats.overruns == 1 || stats.overruns % 100 == 0 {
                warn!(
                    "Control loop overrun: update took {:?} (period {:?}, {} overruns, degraded: {:?})",
                    report.elapsed, period, stats.overruns, report.degraded
                );
            }
            next_tick = now;
        }
    }

    stats
}
