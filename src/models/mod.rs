/// 模型统一接口与实现
///
/// # 架构说明
///
/// 推理引擎以 trait 形式接入流水线, 输出原始检测张量 (N×7):
/// `[image_id, class_id, confidence, xmin, ymin, xmax, ymax]`, 坐标为 [0,1] 归一化值.
///
/// - **MobileNet-SSD**: ONNX Runtime 推理, 文件 `ssd.rs`
///
/// ## 使用示例
/// ```ignore
/// use detstream::models::{BlobParams, InferenceEngine, SsdMobileNet};
///
/// let mut model = SsdMobileNet::load("MobileNetSSD_deploy.onnx", false, BlobParams::default())?;
/// # let frame: detstream::input::Frame = unimplemented!();
/// let tensor = model.infer(&frame)?;
/// # anyhow::Ok(())
/// ```
use anyhow::Result;

use crate::detection::RawDetectionTensor;
use crate::input::Frame;

pub mod ssd;

pub use ssd::{BlobParams, ChannelOrder, SsdMobileNet, SSD_INPUT_SIZE};

/// 推理引擎接口: 一帧输入, 一个原始检测张量输出
pub trait InferenceEngine {
    fn infer(&mut self, frame: &Frame) -> Result<RawDetectionTensor>;

    fn name(&self) -> &str {
        "engine"
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn infer(&mut self, frame: &Frame) -> Result<RawDetectionTensor> {
        (**self).infer(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
