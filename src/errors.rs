// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误分类 (Error taxonomy)
//!
//! - `InitError`:    启动阶段失败, 进程以非零状态退出
//! - `EncodeError`:  单帧压缩失败, 跳过该帧, 帧计数照常递增
//! - `PublishError`: 传输层发送失败, 记录后吞掉, 继续下一帧

use thiserror::Error;

/// Startup failure. Aborts the process before any frame is processed.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to open capture source: {0}")]
    Source(#[from] OpenError),

    #[error("failed to load inference model {path:?}: {source:#}")]
    Model {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to bind publisher on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: zmq::Error,
    },

    #[error("failed to open video writer {path:?}: {source}")]
    Writer {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load class labels from {path:?}: {source}")]
    Labels {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pipeline config {path:?}: {reason}")]
    Config { path: String, reason: String },
}

/// Failure to open a capture source or writer handle.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("source {0:?} does not exist")]
    NotFound(String),

    #[error("source {0:?} contains no readable frames")]
    Empty(String),

    #[error("{descriptor:?} requires the `{feature}` feature")]
    Unsupported {
        descriptor: String,
        feature: &'static str,
    },

    #[error("failed to start decoder for {descriptor:?}: {reason}")]
    Decoder { descriptor: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Compression of one annotated frame failed.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unsupported pixel layout {0:?} for JPEG")]
    UnsupportedLayout(image::ColorType),

    #[error("empty frame {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },

    #[error("JPEG encode failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Transport-level send failure.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("send would block (subscriber queues full)")]
    WouldBlock,

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<zmq::Error> for PublishError {
    fn from(e: zmq::Error) -> Self {
        match e {
            zmq::Error::EAGAIN => PublishError::WouldBlock,
            other => PublishError::Transport(other.to_string()),
        }
    }
}

/// Envelope serialization failed. Not expected for well-formed inputs.
#[derive(Debug, Error)]
#[error("envelope serialization failed: {0}")]
pub struct EnvelopeError(#[from] pub serde_json::Error);
