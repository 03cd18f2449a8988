//! 空链路
//!
//! 全部 actuator 都处于 loopback 模式时不需要打开硬件，驱动仍然需要一个链路实例。

use crate::{IcsLink, LinkError};
use std::time::Duration;

/// 永远处于关闭状态的链路，所有 I/O 都返回 `LinkError::NotOpen`
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLink;

impl IcsLink for NullLink {
    fn purge(&mut self) -> Result<(), LinkError> {
        Err(LinkError::NotOpen)
    }

    fn write(&mut self, _bytes: &[u8]) -> Result<(), LinkError> {
        Err(LinkError::NotOpen)
    }

    fn read_until(&mut self, _n: usize, _timeout: Duration) -> Result<Vec<u8>, LinkError> {
        Err(LinkError::NotOpen)
    }

    fn close(&mut self) {}

    fn is_open(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_link_is_never_open() {
        let mut link = NullLink;
        assert!(!link.is_open());
        assert!(matches!(link.purge(), Err(LinkError::NotOpen)));
        assert!(matches!(link.write(&[0x80]), Err(LinkError::NotOpen)));
        assert!(matches!(
            link.read_until(6, Duration::from_millis(10)),
            Err(LinkError::NotOpen)
        ));
        link.close();
        link.close();
    }
}
