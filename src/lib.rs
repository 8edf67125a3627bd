// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod codec; // JPEG + Base64 转码, 消息封装
pub mod config; // 运行参数
pub mod detection; // 检测结果提取
pub mod errors; // 错误分类
pub mod input; // 采集源
pub mod models; // 推理引擎
pub mod output; // 本地录像
pub mod pipeline; // 逐帧流水线
pub mod render; // 帧标注
pub mod telemetry; // 日志
pub mod transport; // 发布-订阅传输

pub use crate::codec::{DetectionEnvelope, EnvelopeBuilder, MediaTranscoder};
pub use crate::config::{Args, PipelineConfig};
pub use crate::detection::{BBox, ClassLabelTable, DetectionExtractor, DetectionRecord};
pub use crate::errors::{EncodeError, InitError, OpenError, PublishError};
pub use crate::input::{Frame, FrameSource};
pub use crate::models::InferenceEngine;
pub use crate::output::VideoWriter;
pub use crate::pipeline::{Pipeline, PipelineState, RunSummary, TickOutcome};
pub use crate::render::FrameAnnotator;
pub use crate::transport::{MessagePublisher, Transport};
