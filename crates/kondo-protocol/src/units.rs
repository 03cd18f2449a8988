//! 单位换算
//!
//! 脉宽范围 [3500, 11500] 对应 270°，中心 7500 对应 0 rad。

use crate::constants::{CNT_PULSE, MAX_PULSE, MIN_PULSE};

/// 每个脉宽单位对应的弧度
pub const RADIAN_PER_PULSE: f64 =
    270.0 * std::f64::consts::PI / 180.0 / (MAX_PULSE - MIN_PULSE) as f64;

/// 电流值方向分界：小于该值为正向，大于等于为反向
pub const CURRENT_DIRECTION_SPLIT: u8 = 64;

/// 脉宽 → 弧度
#[inline]
pub fn pulse_to_radian(pulse: u16) -> f64 {
    (pulse as f64 - CNT_PULSE as f64) * RADIAN_PER_PULSE
}

/// 弧度 → 脉宽
///
/// 四舍五入到最近的脉宽，并钳位到 [3500, 11500]。NaN 映射到中心位置。
#[inline]
pub fn radian_to_pulse(radian: f64) -> u16 {
    if radian.is_nan() {
        return CNT_PULSE;
    }
    let pulse = CNT_PULSE as f64 + radian / RADIAN_PER_PULSE;
    pulse.round().clamp(MIN_PULSE as f64, MAX_PULSE as f64) as u16
}

/// 舵机电流值 → 带符号力矩代理值
///
/// 方向编码在高区间：`c < 64` → `+c`，`c >= 64` → `-(c - 64)`。
#[inline]
pub fn current_to_effort(current: u8) -> f64 {
    if current < CURRENT_DIRECTION_SPLIT {
        current as f64
    } else {
        -((current - CURRENT_DIRECTION_SPLIT) as f64)
    }
}

#[inline]
pub fn degrees_to_radians(degrees: f64) -> f64 {
    degrees.to_radians()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_is_zero() {
        assert_eq!(pulse_to_radian(CNT_PULSE), 0.0);
        assert_eq!(radian_to_pulse(0.0), CNT_PULSE);
    }

    #[test]
    fn test_full_range_is_270_degrees() {
        let span = pulse_to_radian(MAX_PULSE) - pulse_to_radian(MIN_PULSE);
        assert!((span.to_degrees() - 270.0).abs() < 1e-9);
        assert!((pulse_to_radian(MAX_PULSE).to_degrees() - 135.0).abs() < 1e-9);
    }

    #[test]
    fn test_radian_to_pulse_saturates() {
        assert_eq!(radian_to_pulse(10.0), MAX_PULSE);
        assert_eq!(radian_to_pulse(-10.0), MIN_PULSE);
        assert_eq!(radian_to_pulse(f64::NAN), CNT_PULSE);
    }

    #[test]
    fn test_current_to_effort_table() {
        assert_eq!(current_to_effort(0), 0.0);
        assert_eq!(current_to_effort(30), 30.0);
        assert_eq!(current_to_effort(63), 63.0);
        assert_eq!(current_to_effort(64), 0.0);
        assert_eq!(current_to_effort(100), -36.0);
        assert_eq!(current_to_effort(127), -63.0);
    }
}
