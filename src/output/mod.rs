/// 输出系统 (Output System)
///
/// 可选本地录像: 标注后的帧写入 Motion-JPEG AVI.
pub mod writer;

pub use writer::{MjpegWriter, VideoWriter};
