//! 单舵机诊断操作
//!
//! 与控制循环无关的独立操作（EEPROM 读写、模式标志、ID 读写、移动/脱力/保持），
//! 每个操作针对一个舵机 ID，在给定的 [`Bus`] 上执行有限次事务并返回解码后的值。
//!
//! 模式标志的修改是 EEPROM 的"读-改-写"，在同一个 [`BusSession`](crate::BusSession)
//! 中完成，期间不会插入其他调用者的事务。

use crate::bus::Bus;
use crate::error::TransactionError;
use kondo_protocol::{
    Command, EepromImage, ModeFlag, ParamKind, ProtocolError, ServoId, pulse_to_radian,
    radian_to_pulse,
};
use kondo_serial::IcsLink;
use tracing::info;

fn unexpected(what: &str) -> TransactionError {
    TransactionError::UnexpectedReply(format!("{what} reply carried no value"))
}

/// 读取完整 EEPROM
pub fn read_eeprom<L: IcsLink>(bus: &Bus<L>, id: ServoId) -> Result<EepromImage, TransactionError> {
    let reply = bus.execute(&Command::GetParam {
        id,
        param: ParamKind::Eeprom,
    })?;
    reply.eeprom().cloned().ok_or_else(|| unexpected("eeprom"))
}

/// 整块写入 EEPROM
pub fn write_eeprom<L: IcsLink>(
    bus: &Bus<L>,
    id: ServoId,
    image: &EepromImage,
) -> Result<(), TransactionError> {
    bus.execute(&Command::WriteEeprom {
        id,
        image: Box::new(image.clone()),
    })?;
    info!("EEPROM written to servo {}", id);
    Ok(())
}

/// 读取单字节参数（stretch / speed / current / temperature）
pub fn read_param<L: IcsLink>(
    bus: &Bus<L>,
    id: ServoId,
    param: ParamKind,
) -> Result<u8, TransactionError> {
    if param == ParamKind::Eeprom {
        return Err(ProtocolError::InvalidValue {
            field: "read_param(eeprom)".to_string(),
            value: 0,
        }
        .into());
    }
    let reply = bus.execute(&Command::GetParam { id, param })?;
    reply.param_value().ok_or_else(|| unexpected(param.name()))
}

/// 写入单字节参数，返回舵机确认的值
pub fn write_param<L: IcsLink>(
    bus: &Bus<L>,
    id: ServoId,
    param: ParamKind,
    value: u8,
) -> Result<u8, TransactionError> {
    let reply = bus.execute(&Command::SetParam { id, param, value })?;
    reply.param_value().ok_or_else(|| unexpected(param.name()))
}

pub fn read_flag<L: IcsLink>(
    bus: &Bus<L>,
    id: ServoId,
    flag: ModeFlag,
) -> Result<bool, TransactionError> {
    Ok(read_eeprom(bus, id)?.flag(flag))
}

/// 置位模式标志，返回写入后的 EEPROM
pub fn set_flag<L: IcsLink>(
    bus: &Bus<L>,
    id: ServoId,
    flag: ModeFlag,
) -> Result<EepromImage, TransactionError> {
    modify_eeprom(bus, id, |image| image.set_flag(flag, true))
}

pub fn clear_flag<L: IcsLink>(
    bus: &Bus<L>,
    id: ServoId,
    flag: ModeFlag,
) -> Result<EepromImage, TransactionError> {
    modify_eeprom(bus, id, |image| image.set_flag(flag, false))
}

/// 清除全部模式标志
pub fn clear_all_flags<L: IcsLink>(
    bus: &Bus<L>,
    id: ServoId,
) -> Result<EepromImage, TransactionError> {
    modify_eeprom(bus, id, EepromImage::clear_flags)
}

fn modify_eeprom<L: IcsLink>(
    bus: &Bus<L>,
    id: ServoId,
    change: impl FnOnce(&mut EepromImage),
) -> Result<EepromImage, TransactionError> {
    let mut session = bus.lock();
    let reply = session.execute(&Command::GetParam {
        id,
        param: ParamKind::Eeprom,
    })?;
    let mut image = reply.eeprom().cloned().ok_or_else(|| unexpected("eeprom"))?;
    let before = image.flag_byte();
    change(&mut image);

    if image.flag_byte() == before {
        return Ok(image);
    }
    session.execute(&Command::WriteEeprom {
        id,
        image: Box::new(image.clone()),
    })?;
    info!(
        "Servo {} mode flags 0x{:02X} -> 0x{:02X}",
        id,
        before,
        image.flag_byte()
    );
    Ok(image)
}

/// 读取总线上唯一舵机的 ID
pub fn read_id<L: IcsLink>(bus: &Bus<L>) -> Result<ServoId, TransactionError> {
    let reply = bus.execute(&Command::GetId)?;
    reply.servo_id().ok_or_else(|| unexpected("id"))
}

/// 把总线上唯一舵机的 ID 改为 `id`
pub fn write_id<L: IcsLink>(bus: &Bus<L>, id: ServoId) -> Result<ServoId, TransactionError> {
    let reply = bus.execute(&Command::SetId { id })?;
    let written = reply.servo_id().ok_or_else(|| unexpected("id"))?;
    info!("Servo id set to {}", written);
    Ok(written)
}

/// 移动到指定角度（弧度），返回舵机报告的角度
pub fn move_to<L: IcsLink>(bus: &Bus<L>, id: ServoId, radian: f64) -> Result<f64, TransactionError> {
    let pulse = radian_to_pulse(radian);
    let reply = bus.execute(&Command::Position { id, pulse })?;
    let achieved = reply.pulse().ok_or_else(|| unexpected("position"))?;
    Ok(pulse_to_radian(achieved))
}

/// 脱力，返回脱力时的脉宽
pub fn free<L: IcsLink>(bus: &Bus<L>, id: ServoId) -> Result<u16, TransactionError> {
    let reply = bus.execute(&Command::Free { id })?;
    reply.pulse().ok_or_else(|| unexpected("free"))
}

/// 在当前位置保持，返回保持的脉宽
pub fn hold<L: IcsLink>(bus: &Bus<L>, id: ServoId) -> Result<u16, TransactionError> {
    let reply = bus.execute(&Command::Hold { id })?;
    reply.pulse().ok_or_else(|| unexpected("hold"))
}
