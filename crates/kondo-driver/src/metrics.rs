//! 总线指标
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 事务引擎计数器
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// 发起的事务总数（含失败）
    pub transactions: AtomicU64,
    /// 成功完成的事务数
    pub completed: AtomicU64,
    /// 超时次数（舵机无应答或应答不完整）
    pub timeouts: AtomicU64,
    /// 回显/应答头/长度校验失败次数
    pub protocol_errors: AtomicU64,
    /// 其他链路错误（读写失败、链路已关闭）
    pub link_errors: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            transactions: self.transactions.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            link_errors: self.link_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.transactions.store(0, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.protocol_errors.store(0, Ordering::Relaxed);
        self.link_errors.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusMetricsSnapshot {
    pub transactions: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub protocol_errors: u64,
    pub link_errors: u64,
}

impl BusMetricsSnapshot {
    pub fn failures(&self) -> u64 {
        self.timeouts + self.protocol_errors + self.link_errors
    }

    /// 失败率（百分比，无事务时为 0）
    pub fn failure_rate(&self) -> f64 {
        if self.transactions == 0 {
            return 0.0;
        }
        (self.failures() as f64 / self.transactions as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = BusMetrics::new();
        metrics.transactions.fetch_add(4, Ordering::Relaxed);
        metrics.completed.fetch_add(3, Ordering::Relaxed);
        metrics.timeouts.fetch_add(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transactions, 4);
        assert_eq!(snapshot.failures(), 1);
        assert!((snapshot.failure_rate() - 25.0).abs() < 1e-9);

        metrics.reset();
        assert_eq!(metrics.snapshot(), BusMetricsSnapshot::default());
        assert_eq!(BusMetricsSnapshot::default().failure_rate(), 0.0);
    }
}
