// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测数据结构定义
/// Data structures for the detection stage
use ndarray::Array2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ========== 推理输出张量 ==========

/// 推理引擎原始输出: 每行一个候选框
/// `[batch_index, class_id, confidence, xmin, ymin, xmax, ymax]`, 坐标归一化到 [0,1]
pub type RawDetectionTensor = Array2<f32>;

/// 每行字段数
pub const ROW_LEN: usize = 7;

pub const COL_CLASS_ID: usize = 1;
pub const COL_CONFIDENCE: usize = 2;
pub const COL_XMIN: usize = 3;
pub const COL_YMIN: usize = 4;
pub const COL_XMAX: usize = 5;
pub const COL_YMAX: usize = 6;

// ========== 检测框 ==========

/// 像素坐标检测框 (Detection bounding box in pixel coordinates)
///
/// 序列化为 `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

impl Serialize for BBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BBox {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [x0, y0, x1, y1] = <[i32; 4]>::deserialize(deserializer)?;
        Ok(Self { x0, y0, x1, y1 })
    }
}

// ========== 检测结果 ==========

/// 单个已验证检测 (one validated detection)
///
/// `confidence` 严格大于阈值, `bbox` 已钳制到帧内且 `x0 <= x1`, `y0 <= y1`.
/// 字段顺序即线上格式顺序.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub class_id: i32,
    pub label: String,
    pub confidence: f32,
    pub bbox: BBox,
}
