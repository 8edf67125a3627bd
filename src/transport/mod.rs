/// 传输系统 (Transport System)
///
/// ZeroMQ PUB 广播, 至多一次, 有损.
pub mod publisher;

pub use publisher::{
    MessagePublisher, PublishStats, Transport, ZmqTransport, DEFAULT_BIND_ADDRESS, DEFAULT_SNDHWM,
};
