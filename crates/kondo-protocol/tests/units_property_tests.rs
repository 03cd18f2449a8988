//! 单位换算与编解码的属性测试
//!
//! 使用 proptest 验证数学属性。

use kondo_protocol::*;
use proptest::prelude::*;

proptest! {
    /// 弧度 → 脉宽 → 弧度的误差不超过一个脉宽量化步长
    #[test]
    fn radian_pulse_roundtrip(angle in -2.35f64..2.35f64) {
        let back = pulse_to_radian(radian_to_pulse(angle));
        prop_assert!((back - angle).abs() <= RADIAN_PER_PULSE);
    }

    /// 换算结果永远落在合法脉宽范围内
    #[test]
    fn radian_to_pulse_stays_in_range(angle in proptest::num::f64::ANY) {
        let pulse = radian_to_pulse(angle);
        prop_assert!((MIN_PULSE..=MAX_PULSE).contains(&pulse));
    }

    /// 合法脉宽的位置帧总能被编码，且数据字节为 7 bit
    #[test]
    fn position_frame_is_7bit(id in 0u8..=31, pulse in MIN_PULSE..=MAX_PULSE) {
        let frame = Command::Position { id: ServoId::new(id).unwrap(), pulse }.encode().unwrap();
        prop_assert_eq!(frame[0] & ICS_CMD_MASK, ICS_CMD_POS);
        prop_assert_eq!(frame[0] & ICS_ID_MASK, id);
        prop_assert!(frame[1..].iter().all(|b| b & 0x80 == 0));
    }

    /// 力矩代理值的绝对值不超过 63
    #[test]
    fn effort_is_bounded(current in 0u8..=127) {
        prop_assert!(current_to_effort(current).abs() <= 63.0);
    }
}
