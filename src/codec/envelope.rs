// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 消息封装 (Envelope builder)
//!
//! 线上格式 (字段名与顺序属于兼容性契约):
//! ```text
//! {"frame":<i64>,"detections":[{"class_id":..,"label":..,"confidence":..,"bbox":[x0,y0,x1,y1]}],"image":"<base64 jpeg>"}
//! ```

use serde::{Deserialize, Serialize};

use crate::detection::DetectionRecord;
use crate::errors::EnvelopeError;

/// 每帧一条的输出消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEnvelope {
    pub frame: i64,
    pub detections: Vec<DetectionRecord>,
    pub image: String,
}

impl DetectionEnvelope {
    /// 订阅端解析
    pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeBuilder;

impl EnvelopeBuilder {
    pub fn build(
        &self,
        frame: i64,
        detections: Vec<DetectionRecord>,
        image: String,
    ) -> DetectionEnvelope {
        DetectionEnvelope {
            frame,
            detections,
            image,
        }
    }

    /// 紧凑 JSON 序列化
    pub fn serialize(&self, envelope: &DetectionEnvelope) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(envelope)?)
    }
}
