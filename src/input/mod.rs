/// 视频输入系统 (Video Input System)
///
/// - Frame:  单帧图像
/// - source: 采集源契约与图片序列源
/// - ffmpeg: 摄像头/视频文件/网络流解码 (需要 `ffmpeg` 特性)
pub mod frame;
pub mod source;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use frame::Frame;
pub use source::{
    effective_fps, open_source, recording_fps, FrameSource, ImageSequenceSource, SourceDescriptor,
    DEFAULT_FPS,
};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSource;
