// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use image::{DynamicImage, RgbImage};

/// 单帧图像 (one captured frame)
///
/// 在一个 tick 内由流水线独占, 标注阶段原地修改, tick 结束后丢弃.
#[derive(Clone, Debug)]
pub struct Frame {
    image: DynamicImage,
    index: u64, // 采集端的帧序号
}

impl Frame {
    pub fn new(image: DynamicImage, index: u64) -> Self {
        Self { image, index }
    }

    /// 由紧凑RGB24数据构造, 尺寸不匹配时返回 None
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>, index: u64) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|img| Self::new(DynamicImage::ImageRgb8(img), index))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut DynamicImage {
        &mut self.image
    }
}
