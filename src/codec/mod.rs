/// 编码系统 (Codec System)
///
/// - transcoder: JPEG 压缩 + Base64 文本编码
/// - envelope:   消息封装与 JSON 序列化
pub mod envelope;
pub mod transcoder;

pub use envelope::{DetectionEnvelope, EnvelopeBuilder};
pub use transcoder::{decode_text, encode_text, MediaTranscoder, DEFAULT_JPEG_QUALITY};
