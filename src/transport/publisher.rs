// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 消息发布器 (Message publisher)
//!
//! 单次尽力发送: 失败只记录, 不重试, 不排队, 不向调用方施加背压.
//! 慢或不在线的订阅者直接丢帧.

use tracing::{info, warn};

use crate::errors::{InitError, PublishError};

/// 默认绑定地址
pub const DEFAULT_BIND_ADDRESS: &str = "tcp://*:5555";

/// 默认每个订阅者的发送高水位 (消息条数)
pub const DEFAULT_SNDHWM: i32 = 16;

/// 发布-订阅传输端点
pub trait Transport {
    /// 非阻塞发送一条消息
    fn send(&mut self, payload: &[u8]) -> Result<(), PublishError>;

    fn endpoint(&self) -> &str;
}

/// ZeroMQ PUB 套接字
pub struct ZmqTransport {
    _context: zmq::Context,
    socket: zmq::Socket,
    address: String,
}

impl ZmqTransport {
    /// 绑定失败为致命错误
    pub fn bind(address: &str, sndhwm: i32) -> Result<Self, InitError> {
        let bind_err = |source| InitError::Bind {
            address: address.to_string(),
            source,
        };
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PUB).map_err(bind_err)?;
        socket.set_sndhwm(sndhwm).map_err(bind_err)?;
        socket.set_linger(0).map_err(bind_err)?;
        socket.bind(address).map_err(bind_err)?;

        info!("✅ ZeroMQ publisher bound to {}", address);
        Ok(Self {
            _context: context,
            socket,
            address: address.to_string(),
        })
    }
}

impl Transport for ZmqTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), PublishError> {
        self.socket.send(payload, zmq::DONTWAIT)?;
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.address
    }
}

/// 发送统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub dropped: u64,
}

pub struct MessagePublisher<T: Transport> {
    transport: T,
    stats: PublishStats,
}

impl<T: Transport> MessagePublisher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            stats: PublishStats::default(),
        }
    }

    /// 尽力发送, 错误在此处记录并吞掉; 返回是否发送成功仅供统计
    pub fn publish(&mut self, frame: i64, payload: &str) -> bool {
        match self.transport.send(payload.as_bytes()) {
            Ok(()) => {
                self.stats.published += 1;
                true
            }
            Err(e) => {
                self.stats.dropped += 1;
                warn!(frame, error = %e, dropped = self.stats.dropped, "publish failed, frame dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Flaky {
        sent: Vec<Vec<u8>>,
        fail_every: usize,
        calls: usize,
    }

    impl Transport for Flaky {
        fn send(&mut self, payload: &[u8]) -> Result<(), PublishError> {
            self.calls += 1;
            if self.fail_every > 0 && self.calls % self.fail_every == 0 {
                return Err(PublishError::WouldBlock);
            }
            self.sent.push(payload.to_vec());
            Ok(())
        }

        fn endpoint(&self) -> &str {
            "inproc://flaky"
        }
    }

    #[test]
    fn test_errors_are_swallowed_and_counted() {
        let mut publisher = MessagePublisher::new(Flaky {
            fail_every: 2,
            ..Default::default()
        });
        let results: Vec<bool> = (0..5).map(|i| publisher.publish(i, "{}")).collect();
        assert_eq!(results, vec![true, false, true, false, true]);
        assert_eq!(
            publisher.stats(),
            PublishStats {
                published: 3,
                dropped: 2
            }
        );
        assert_eq!(publisher.transport().sent.len(), 3);
    }

    #[test]
    fn test_zmq_error_mapping() {
        assert!(matches!(
            PublishError::from(zmq::Error::EAGAIN),
            PublishError::WouldBlock
        ));
        assert!(matches!(
            PublishError::from(zmq::Error::ETERM),
            PublishError::Transport(_)
        ));
    }

    #[test]
    fn test_zmq_publish_without_subscribers() {
        // 无订阅者时 PUB 直接丢弃, 不阻塞也不报错
        let mut transport = ZmqTransport::bind("inproc://detstream-test", 4).unwrap();
        for _ in 0..100 {
            transport.send(b"{\"frame\":0}").unwrap();
        }
        assert_eq!(transport.endpoint(), "inproc://detstream-test");
    }

    #[test]
    fn test_zmq_bind_failure_is_init_error() {
        let err = ZmqTransport::bind("not-a-valid-endpoint", 4).err().unwrap();
        assert!(matches!(err, InitError::Bind { .. }));
    }
}
