//! eeprom 命令
//!
//! 读取并打印完整 EEPROM（64 个 4 bit 槽位）

use anyhow::{Context, Result};
use clap::Args;
use kondo_driver::{Bus, diagnostics};
use kondo_protocol::{EepromImage, ModeFlag, ServoId};
use kondo_serial::IcsLink;

use crate::utils::{LinkArgs, parse_servo_id};

#[derive(Args, Debug)]
pub struct EepromCommand {
    /// 舵机 ID
    #[arg(value_parser = parse_servo_id)]
    pub id: ServoId,
}

impl EepromCommand {
    pub fn execute(&self, link: &LinkArgs) -> Result<()> {
        let bus = link.open_bus()?;
        let image = self.run(&bus)?;
        print!("{}", render(&image));
        Ok(())
    }

    pub fn run<L: IcsLink>(&self, bus: &Bus<L>) -> Result<EepromImage> {
        diagnostics::read_eeprom(bus, self.id)
            .with_context(|| format!("failed to read EEPROM of servo {}", self.id))
    }
}

/// 摘要 + 槽位转储
pub fn render(image: &EepromImage) -> String {
    let mut out = format!(
        "stretch: {}\nspeed:   {}\nflags:   0x{:02X}",
        image.stretch(),
        image.speed(),
        image.flag_byte()
    );
    let set: Vec<_> = ModeFlag::ALL
        .into_iter()
        .filter(|flag| image.flag(*flag))
        .map(ModeFlag::name)
        .collect();
    if !set.is_empty() {
        out.push_str(&format!(" ({})", set.join(", ")));
    }
    out.push_str(&format!("\n{image}\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kondo_serial::mock::{MockLink, ServoBus};

    #[test]
    fn test_eeprom_command_reads_image() {
        let servos = ServoBus::shared(&[3]);
        {
            let mut servos = servos.lock();
            let servo = servos.servo_mut(3).unwrap();
            servo.eeprom[2] = 0x3;
            servo.eeprom[3] = 0xC;
            servo.eeprom[15] = 0x1;
        }
        let bus = Bus::new(MockLink::with_servos(servos));
        let cmd = EepromCommand {
            id: ServoId::new(3).unwrap(),
        };

        let image = cmd.run(&bus).unwrap();
        assert_eq!(image.stretch(), 0x3C);

        let text = render(&image);
        assert!(text.starts_with("stretch: 60\n"));
        assert!(text.contains("(reverse)"));
        assert!(text.contains("\n00: 5 A 3 C 0"));
        assert!(text.contains("\n30: "));
        assert_eq!(text.lines().count(), 7);
    }

    #[test]
    fn test_eeprom_command_missing_servo() {
        let bus = Bus::new(MockLink::with_servos(ServoBus::shared(&[])));
        let cmd = EepromCommand {
            id: ServoId::new(1).unwrap(),
        };
        let err = cmd.run(&bus).unwrap_err();
        assert!(err.to_string().contains("servo 1"));
    }
}
