// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// MobileNet-SSD 模型实现
// 包含: 模型加载、预处理 (blob)、推理、输出整形

use std::path::Path;

use anyhow::{bail, Context, Result};
use fast_image_resize as fr;
use ndarray::Array2;
use ort::execution_providers as ep;
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::InferenceEngine;
use crate::detection::{RawDetectionTensor, ROW_LEN};
use crate::input::Frame;

/// 网络输入边长
pub const SSD_INPUT_SIZE: u32 = 300;
/// 像素缩放因子 (1/127.5)
pub const SSD_SCALE: f32 = 0.007843;
/// 均值
pub const SSD_MEAN: f32 = 127.5;

/// 输入张量的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Caffe 训练的模型按 BGR 输入
    #[default]
    Bgr,
    Rgb,
}

/// 预处理参数
#[derive(Debug, Clone, Copy)]
pub struct BlobParams {
    pub size: u32,
    pub scale: f32,
    pub mean: f32,
    pub order: ChannelOrder,
}

impl Default for BlobParams {
    fn default() -> Self {
        Self {
            size: SSD_INPUT_SIZE,
            scale: SSD_SCALE,
            mean: SSD_MEAN,
            order: ChannelOrder::Bgr,
        }
    }
}

/// MobileNet-SSD 检测器
pub struct SsdMobileNet {
    session: Session,
    params: BlobParams,
    resizer: fr::Resizer,
}

impl SsdMobileNet {
    /// 加载 ONNX 模型; `accelerated` 时依次尝试 TensorRT / CUDA, 失败回退 CPU
    pub fn load<P: AsRef<Path>>(model: P, accelerated: bool, params: BlobParams) -> Result<Self> {
        let model = model.as_ref();
        let mut builder = Session::builder().context("failed to create ORT session builder")?;
        if accelerated {
            builder = builder
                .with_execution_providers([
                    ep::TensorRTExecutionProvider::default().build(),
                    ep::CUDAExecutionProvider::default().build(),
                ])
                .context("failed to register execution providers")?;
        }
        let session = builder
            .commit_from_file(model)
            .with_context(|| format!("failed to load model {:?}", model))?;

        info!(
            "✅ model loaded: {:?} (input {}x{}, accelerated: {})",
            model, params.size, params.size, accelerated
        );
        Ok(Self {
            session,
            params,
            resizer: fr::Resizer::new(),
        })
    }

    fn preprocess(&mut self, frame: &Frame) -> Result<Vec<f32>> {
        let rgb = frame.image().to_rgb8();
        let (w, h) = rgb.dimensions();
        let src = fr::images::Image::from_vec_u8(w, h, rgb.into_raw(), fr::PixelType::U8x3)
            .context("failed to wrap frame for resize")?;
        let size = self.params.size;
        let mut dst = fr::images::Image::new(size, size, fr::PixelType::U8x3);
        self.resizer
            .resize(
                &src,
                &mut dst,
                &fr::ResizeOptions::new()
                    .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
            )
            .context("resize to network input failed")?;

        Ok(blob_from_rgb(dst.buffer(), size, &self.params))
    }
}

impl InferenceEngine for SsdMobileNet {
    fn infer(&mut self, frame: &Frame) -> Result<RawDetectionTensor> {
        let data = self.preprocess(frame)?;
        let size = self.params.size as usize;
        let shape = [1usize, 3, size, size];
        let input = Tensor::from_array((shape, data.into_boxed_slice()))
            .context("failed to create input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .context("SSD inference failed")?;
        let (_, value) = outputs.iter().next().context("model produced no outputs")?;
        let (_shape, raw) = value
            .try_extract_tensor::<f32>()
            .context("failed to extract detection tensor")?;

        rows_from_flat(raw)
    }

    fn name(&self) -> &str {
        "mobilenet-ssd"
    }
}

/// 打包 RGB24 → NCHW 浮点, `(p - mean) * scale`
pub fn blob_from_rgb(pixels: &[u8], size: u32, params: &BlobParams) -> Vec<f32> {
    let plane = (size * size) as usize;
    let mut blob = vec![0f32; 3 * plane];
    let channel_map = match params.order {
        ChannelOrder::Bgr => [2, 1, 0],
        ChannelOrder::Rgb => [0, 1, 2],
    };
    for (idx, px) in pixels.chunks_exact(3).take(plane).enumerate() {
        for (c, &src) in channel_map.iter().enumerate() {
            blob[c * plane + idx] = (px[src] as f32 - params.mean) * params.scale;
        }
    }
    blob
}

/// `[1, 1, N, 7]` 输出展平为 N×7
pub fn rows_from_flat(raw: &[f32]) -> Result<RawDetectionTensor> {
    if raw.len() % ROW_LEN != 0 {
        bail!(
            "detection output length {} is not a multiple of {}",
            raw.len(),
            ROW_LEN
        );
    }
    Ok(Array2::from_shape_vec((raw.len() / ROW_LEN, ROW_LEN), raw.to_vec())?)
}
