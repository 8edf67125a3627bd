// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 媒体转码 (Media transcoder)
//!
//! 两步: 标注帧 → JPEG (质量80) → Base64 文本.
//! 第一步可能失败 (单帧可恢复), 第二步是全函数.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::errors::EncodeError;
use crate::input::Frame;

/// 默认JPEG质量
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy)]
pub struct MediaTranscoder {
    quality: u8,
}

impl Default for MediaTranscoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl MediaTranscoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// 压缩 + 文本编码
    pub fn transcode(&self, frame: &Frame) -> Result<String, EncodeError> {
        let jpeg = self.compress(frame)?;
        Ok(encode_text(&jpeg))
    }

    /// 有损压缩为 JPEG
    ///
    /// 8位 RGB/灰度直接编码; 带 alpha 的8位图丢弃 alpha; 16位与浮点布局返回
    /// `UnsupportedLayout`.
    pub fn compress(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        if frame.is_empty() {
            return Err(EncodeError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let mut buffer = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
            match frame.image() {
                DynamicImage::ImageRgb8(img) => encoder.encode_image(img)?,
                DynamicImage::ImageLuma8(img) => encoder.encode_image(img)?,
                img @ DynamicImage::ImageRgba8(_) => encoder.encode_image(&img.to_rgb8())?,
                img @ DynamicImage::ImageLumaA8(_) => encoder.encode_image(&img.to_luma8())?,
                other => return Err(EncodeError::UnsupportedLayout(other.color())),
            }
        }
        Ok(buffer)
    }
}

/// Base64 (标准字母表, `=` 填充); 输出长度恒为 `ceil(n/3)*4`
pub fn encode_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// `encode_text` 的逆运算, 供订阅端与测试使用
pub fn decode_text(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}
