//! move / free / hold 命令

use anyhow::{Context, Result};
use clap::Args;
use kondo_driver::{Bus, diagnostics};
use kondo_protocol::{ServoId, degrees_to_radians, pulse_to_radian};
use kondo_serial::IcsLink;

use crate::utils::{LinkArgs, parse_degrees, parse_servo_id};

/// 移动到指定角度
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 舵机 ID
    #[arg(value_parser = parse_servo_id)]
    pub id: ServoId,

    /// 目标角度（度，中点为 0）
    #[arg(value_parser = parse_degrees, allow_negative_numbers = true)]
    pub degrees: f64,
}

impl MoveCommand {
    pub fn execute(&self, link: &LinkArgs) -> Result<()> {
        let bus = link.open_bus()?;
        let achieved = self.run(&bus)?;
        println!(
            "servo {} -> {:.2}° (reported {:.2}°)",
            self.id,
            self.degrees,
            achieved.to_degrees()
        );
        Ok(())
    }

    /// 返回舵机报告的角度（弧度）
    pub fn run<L: IcsLink>(&self, bus: &Bus<L>) -> Result<f64> {
        diagnostics::move_to(bus, self.id, degrees_to_radians(self.degrees))
            .with_context(|| format!("failed to move servo {}", self.id))
    }
}

/// 脱力
#[derive(Args, Debug)]
pub struct FreeCommand {
    #[arg(value_parser = parse_servo_id)]
    pub id: ServoId,
}

impl FreeCommand {
    pub fn execute(&self, link: &LinkArgs) -> Result<()> {
        let bus = link.open_bus()?;
        let pulse = self.run(&bus)?;
        println!("servo {} free at {} ({:.2}°)", self.id, pulse, pulse_to_radian(pulse).to_degrees());
        Ok(())
    }

    pub fn run<L: IcsLink>(&self, bus: &Bus<L>) -> Result<u16> {
        diagnostics::free(bus, self.id).with_context(|| format!("failed to free servo {}", self.id))
    }
}

/// 在当前位置保持
#[derive(Args, Debug)]
pub struct HoldCommand {
    #[arg(value_parser = parse_servo_id)]
    pub id: ServoId,
}

impl HoldCommand {
    pub fn execute(&self, link: &LinkArgs) -> Result<()> {
        let bus = link.open_bus()?;
        let pulse = self.run(&bus)?;
        println!("servo {} holding at {} ({:.2}°)", self.id, pulse, pulse_to_radian(pulse).to_degrees());
        Ok(())
    }

    pub fn run<L: IcsLink>(&self, bus: &Bus<L>) -> Result<u16> {
        diagnostics::hold(bus, self.id).with_context(|| format!("failed to hold servo {}", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kondo_protocol::radian_to_pulse;
    use kondo_serial::mock::{MockLink, ServoBus};

    #[test]
    fn test_move_free_hold() {
        let servos = ServoBus::shared(&[1]);
        let bus = Bus::new(MockLink::with_servos(servos.clone()));
        let id = ServoId::new(1).unwrap();

        let achieved = MoveCommand { id, degrees: -30.0 }.run(&bus).unwrap();
        let target = radian_to_pulse((-30f64).to_radians());
        assert_eq!(servos.lock().servo(1).unwrap().pulse, target);
        assert_eq!(achieved, pulse_to_radian(target));

        assert_eq!(FreeCommand { id }.run(&bus).unwrap(), target);
        assert!(servos.lock().servo(1).unwrap().free);

        assert_eq!(HoldCommand { id }.run(&bus).unwrap(), target);
        assert!(!servos.lock().servo(1).unwrap().free);
    }

    #[test]
    fn test_move_unknown_servo_fails() {
        let bus = Bus::new(MockLink::with_servos(ServoBus::shared(&[1])));
        let id = ServoId::new(2).unwrap();
        let err = MoveCommand { id, degrees: 10.0 }.run(&bus).unwrap_err();
        assert!(err.to_string().contains("servo 2"));
    }
}
