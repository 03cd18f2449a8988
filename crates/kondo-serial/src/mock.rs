//! Mock 链路
//!
//! 用于在没有硬件的情况下测试事务引擎和驱动层：
//! - [`MockLink`]：脚本化应答 + 事件记录，克隆后共享同一份状态
//! - [`ServoBus`]：按 ICS 帧格式模拟一串舵机（含适配器回显）

use crate::{IcsLink, LinkError};
use kondo_protocol::*;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// 对一次写入的模拟应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// 放入接收缓冲区的字节
    Bytes(Vec<u8>),
    /// 无应答：`read_until` 等满超时后返回 `Timeout`
    Silent,
    /// 无应答，但 `read_until` 立即返回 `Timeout`（缩短测试时间）
    Timeout,
}

/// 链路事件（按调用顺序记录）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Purge,
    Write(Vec<u8>),
    Read { requested: usize },
    Close,
}

type Responder = Box<dyn FnMut(&[u8]) -> MockReply + Send>;

struct MockState {
    events: Vec<LinkEvent>,
    rx: VecDeque<u8>,
    pending: Option<MockReply>,
    responder: Responder,
    open: bool,
    read_delay: Duration,
    close_count: usize,
}

/// 脚本化 Mock 链路
///
/// 克隆得到的实例共享同一份状态，可以在链路被移入驱动后继续检查事件记录。
#[derive(Clone)]
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    /// 使用自定义应答函数创建
    pub fn new(responder: impl FnMut(&[u8]) -> MockReply + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                events: Vec::new(),
                rx: VecDeque::new(),
                pending: None,
                responder: Box::new(responder),
                open: true,
                read_delay: Duration::ZERO,
                close_count: 0,
            })),
        }
    }

    /// 永不应答的链路
    pub fn silent() -> Self {
        Self::new(|_| MockReply::Silent)
    }

    /// 连接到模拟舵机总线
    pub fn with_servos(bus: Arc<Mutex<ServoBus>>) -> Self {
        Self::new(move |frame| bus.lock().respond(frame))
    }

    /// 每次 `read_until` 前的额外延迟（用于放大并发交错的窗口）
    pub fn set_read_delay(&self, delay: Duration) {
        self.state.lock().read_delay = delay;
    }

    pub fn events(&self) -> Vec<LinkEvent> {
        self.state.lock().events.clone()
    }

    /// 所有写出的帧
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                LinkEvent::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// 链路调用总次数（purge / write / read / close）
    pub fn interactions(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }
}

impl IcsLink for MockLink {
    fn purge(&mut self) -> Result<(), LinkError> {
        let mut state = self.state.lock();
        state.events.push(LinkEvent::Purge);
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        state.rx.clear();
        state.pending = None;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut state = self.state.lock();
        state.events.push(LinkEvent::Write(bytes.to_vec()));
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        match (state.responder)(bytes) {
            MockReply::Bytes(reply) => state.rx.extend(reply),
            other => state.pending = Some(other),
        }
        Ok(())
    }

    fn read_until(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let delay = {
            let mut state = self.state.lock();
            state.events.push(LinkEvent::Read { requested: n });
            if !state.open {
                return Err(LinkError::NotOpen);
            }
            state.read_delay
        };
        if !delay.is_zero() {
            std::thread::sleep(delay.min(timeout));
        }

        let mut state = self.state.lock();
        if state.rx.len() >= n {
            return Ok(state.rx.drain(..n).collect());
        }

        let received = state.rx.len();
        state.rx.clear();
        let pending = state.pending.take();
        drop(state);

        if pending != Some(MockReply::Timeout) {
            std::thread::sleep(timeout.saturating_sub(delay));
        }
        Err(LinkError::Timeout {
            expected: n,
            received,
            timeout,
        })
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.events.push(LinkEvent::Close);
        if state.open {
            state.open = false;
            state.close_count += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }
}

// ============================================================================
// 舵机总线模拟
// ============================================================================

/// 单个模拟舵机
#[derive(Debug, Clone)]
pub struct SimServo {
    pub pulse: u16,
    pub free: bool,
    pub stretch: u8,
    pub speed: u8,
    pub current_limit: u8,
    pub temperature_limit: u8,
    /// GetParam(Current) 返回的电流值
    pub current: u8,
    /// GetParam(Temperature) 返回的温度值
    pub temperature: u8,
    pub eeprom: [u8; EEPROM_LEN],
}

impl Default for SimServo {
    fn default() -> Self {
        let mut eeprom = [0u8; EEPROM_LEN];
        eeprom[0] = 0x5;
        eeprom[1] = 0xA;
        Self {
            pulse: CNT_PULSE,
            free: false,
            stretch: 60,
            speed: 127,
            current_limit: 63,
            temperature_limit: 80,
            current: 0,
            temperature: 30,
            eeprom,
        }
    }
}

/// 模拟的 ICS 舵机总线（含适配器回显）
#[derive(Debug, Default)]
pub struct ServoBus {
    pub servos: BTreeMap<u8, SimServo>,
    /// 指定 ID 的舵机返回固定应答（模拟故障）
    pub faults: BTreeMap<u8, MockReply>,
}

impl ServoBus {
    pub fn new(ids: &[u8]) -> Self {
        Self {
            servos: ids.iter().map(|id| (*id, SimServo::default())).collect(),
            faults: BTreeMap::new(),
        }
    }

    pub fn shared(ids: &[u8]) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(ids)))
    }

    pub fn servo(&self, id: u8) -> Option<&SimServo> {
        self.servos.get(&id)
    }

    pub fn servo_mut(&mut self, id: u8) -> Option<&mut SimServo> {
        self.servos.get_mut(&id)
    }

    /// 让指定舵机永远立即超时
    pub fn fail(&mut self, id: u8) {
        self.faults.insert(id, MockReply::Timeout);
    }

    /// 处理一帧并生成 "回显 + 响应"
    pub fn respond(&mut self, frame: &[u8]) -> MockReply {
        let Some(&head) = frame.first() else {
            return MockReply::Silent;
        };
        let class = head & ICS_CMD_MASK;
        let id = head & ICS_ID_MASK;

        if class == ICS_CMD_ID {
            return self.respond_id(frame);
        }
        if let Some(fault) = self.faults.get(&id) {
            return fault.clone();
        }
        let Some(servo) = self.servos.get_mut(&id) else {
            return MockReply::Timeout;
        };

        let response = match class {
            ICS_CMD_POS if frame.len() == 3 => {
                let pulse = ((frame[1] as u16) << 7) | frame[2] as u16;
                if pulse == FREE_PULSE {
                    servo.free = true;
                } else {
                    servo.free = false;
                    servo.pulse = pulse;
                }
                vec![id, (servo.pulse >> 7) as u8 & 0x7F, servo.pulse as u8 & 0x7F]
            },
            ICS_CMD_GET if frame.len() == 2 => {
                let sc = frame[1];
                let mut resp = vec![0x20 | id, sc];
                match sc {
                    ICS_SC_EEPROM => resp.extend_from_slice(&servo.eeprom),
                    ICS_SC_STRETCH => resp.push(servo.stretch),
                    ICS_SC_SPEED => resp.push(servo.speed),
                    ICS_SC_CURRENT => resp.push(servo.current),
                    ICS_SC_TEMPERATURE => resp.push(servo.temperature),
                    _ => return MockReply::Silent,
                }
                resp
            },
            ICS_CMD_SET if frame.len() == 2 + EEPROM_LEN && frame[1] == ICS_SC_EEPROM => {
                servo.eeprom.copy_from_slice(&frame[2..]);
                vec![0x40 | id, ICS_SC_EEPROM]
            },
            ICS_CMD_SET if frame.len() == 3 => {
                let (sc, value) = (frame[1], frame[2]);
                match sc {
                    ICS_SC_STRETCH => servo.stretch = value,
                    ICS_SC_SPEED => servo.speed = value,
                    ICS_SC_CURRENT => servo.current_limit = value,
                    ICS_SC_TEMPERATURE => servo.temperature_limit = value,
                    _ => return MockReply::Silent,
                }
                vec![0x40 | id, sc, value]
            },
            _ => return MockReply::Silent,
        };
        echo(frame, &response)
    }

    /// ID 命令只有在总线上恰好一个舵机时才有意义
    fn respond_id(&mut self, frame: &[u8]) -> MockReply {
        if frame.len() != 4 || self.servos.len() != 1 {
            return MockReply::Silent;
        }
        let Some((&current, _)) = self.servos.iter().next() else {
            return MockReply::Silent;
        };
        if frame[1..] == [ICS_SC_READ; 3] {
            return echo(frame, &[ICS_CMD_ID | current]);
        }
        if frame[1..] == [ICS_SC_WRITE; 3] {
            let new_id = frame[0] & ICS_ID_MASK;
            if let Some(servo) = self.servos.remove(&current) {
                self.servos.insert(new_id, servo);
            }
            return echo(frame, &[ICS_CMD_ID | new_id]);
        }
        MockReply::Silent
    }
}

fn echo(frame: &[u8], response: &[u8]) -> MockReply {
    let mut bytes = frame.to_vec();
    bytes.extend_from_slice(response);
    MockReply::Bytes(bytes)
}
