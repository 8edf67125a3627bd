// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 类别标签表 (Class label table)
//!
//! 启动时构建一次, 之后只读, 通过引用注入到提取器与标注器中.

use std::fs;
use std::path::Path;

use crate::errors::InitError;

/// 越界类别ID的占位标签
pub const UNKNOWN_LABEL: &str = "Unknown";

/// MobileNet-SSD (PASCAL VOC) 的21个类别, 0号为背景
pub const VOC_LABELS: [&str; 21] = [
    "background",
    "aeroplane",
    "bicycle",
    "bird",
    "boat",
    "bottle",
    "bus",
    "car",
    "cat",
    "chair",
    "cow",
    "diningtable",
    "dog",
    "horse",
    "motorbike",
    "person",
    "pottedplant",
    "sheep",
    "sofa",
    "train",
    "tvmonitor",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabelTable {
    names: Vec<String>,
}

impl Default for ClassLabelTable {
    fn default() -> Self {
        Self::voc()
    }
}

impl ClassLabelTable {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn voc() -> Self {
        Self::new(VOC_LABELS)
    }

    /// 从文本文件加载: 每行一个标签, 空行与 `#` 注释行忽略
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, InitError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| InitError::Labels {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// 按类别ID查找标签, 越界 (含负数) 返回 `"Unknown"`
    pub fn name(&self, class_id: i32) -> &str {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.names.get(idx))
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
