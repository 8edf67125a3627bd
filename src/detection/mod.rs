/// 检测系统 (Detection System)
///
/// 逐帧纯函数阶段:
/// - labels:    类别ID → 标签名
/// - extractor: 原始张量 → DetectionRecord
/// - types:     检测数据结构
pub mod extractor;
pub mod labels;
pub mod types;

pub use extractor::{DetectionExtractor, DEFAULT_CONF_THRESHOLD};
pub use labels::{ClassLabelTable, UNKNOWN_LABEL, VOC_LABELS};
pub use types::{BBox, DetectionRecord, RawDetectionTensor, ROW_LEN};
