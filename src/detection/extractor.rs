// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测提取器 (Detection extractor)
//!
//! 原始张量 → 置信度过滤 → 坐标反归一化 → 标签解析.
//! 纯函数, 保持张量行顺序.

use ndarray::ArrayView1;

use super::labels::ClassLabelTable;
use super::types::{
    BBox, DetectionRecord, RawDetectionTensor, COL_CLASS_ID, COL_CONFIDENCE, COL_XMAX, COL_XMIN,
    COL_YMAX, COL_YMIN, ROW_LEN,
};

/// 默认置信度阈值
pub const DEFAULT_CONF_THRESHOLD: f32 = 0.2;

pub struct DetectionExtractor<'a> {
    labels: &'a ClassLabelTable,
    threshold: f32,
}

impl<'a> DetectionExtractor<'a> {
    pub fn new(labels: &'a ClassLabelTable, threshold: f32) -> Self {
        Self { labels, threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// 提取本帧检测结果
    ///
    /// `confidence <= threshold` 的行直接丢弃. 列数不足的张量视为无检测.
    pub fn extract(
        &self,
        tensor: &RawDetectionTensor,
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<DetectionRecord> {
        if tensor.ncols() < ROW_LEN {
            return Vec::new();
        }

        tensor
            .rows()
            .into_iter()
            .filter(|row| row[COL_CONFIDENCE] > self.threshold)
            .map(|row| self.to_record(row, frame_width, frame_height))
            .collect()
    }

    fn to_record(&self, row: ArrayView1<f32>, frame_width: u32, frame_height: u32) -> DetectionRecord {
        let class_id = row[COL_CLASS_ID] as i32;

        let xa = denormalize(row[COL_XMIN], frame_width);
        let ya = denormalize(row[COL_YMIN], frame_height);
        let xb = denormalize(row[COL_XMAX], frame_width);
        let yb = denormalize(row[COL_YMAX], frame_height);

        DetectionRecord {
            class_id,
            label: self.labels.name(class_id).to_string(),
            confidence: row[COL_CONFIDENCE],
            bbox: BBox::new(xa.min(xb), ya.min(yb), xa.max(xb), ya.max(yb)),
        }
    }
}

/// 归一化坐标 × 边长, 截断为整数, 钳制到 `[0, extent)`
fn denormalize(v: f32, extent: u32) -> i32 {
    let max = extent.saturating_sub(1).min(i32::MAX as u32) as i32;
    ((v * extent as f32) as i32).clamp(0, max)
}
