// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 运行参数: 命令行 + 可选 JSON 配置文件
//!
//! 优先级: 命令行 > 配置文件 > 默认值

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::DEFAULT_JPEG_QUALITY;
use crate::detection::DEFAULT_CONF_THRESHOLD;
use crate::errors::InitError;
use crate::input::DEFAULT_FPS;
use crate::models::ssd::{SSD_MEAN, SSD_SCALE};
use crate::models::{BlobParams, ChannelOrder, SSD_INPUT_SIZE};
use crate::transport::{DEFAULT_BIND_ADDRESS, DEFAULT_SNDHWM};

/// 逐帧目标检测并通过 ZeroMQ 广播结果
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Per-frame detection broadcaster", long_about = None)]
pub struct Args {
    /// 采集源: `camera`、设备序号、图片目录、图片或视频文件
    pub source: String,

    /// 录像输出路径 (Motion-JPEG AVI)
    pub output: Option<PathBuf>,

    /// ONNX 模型文件
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// 类别名文件, 每行一个; 缺省为 VOC 21 类
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// 置信度阈值 [默认 0.2]
    #[arg(long)]
    pub conf: Option<f32>,

    /// 发布端绑定地址 [默认 tcp://*:5555]
    #[arg(long)]
    pub bind: Option<String>,

    /// JPEG 质量 1-100 [默认 80]
    #[arg(long)]
    pub quality: Option<u8>,

    /// 优先使用 TensorRT / CUDA
    #[arg(long)]
    pub accel: bool,

    /// 源帧率未知时使用的帧率 [默认 30]
    #[arg(long)]
    pub fps: Option<f64>,

    /// 每个订阅者的发送高水位
    #[arg(long)]
    pub sndhwm: Option<i32>,

    /// TrueType 标签字体
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// JSON 配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 打印合并后的配置并退出
    #[arg(long)]
    pub print_config: bool,
}

/// 流水线配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub model: PathBuf,
    pub labels: Option<PathBuf>,

    // === 检测 ===
    pub conf_threshold: f32,
    pub prefer_accelerated: bool,
    pub input_size: u32,
    pub input_scale: f32,
    pub input_mean: f32,
    pub channel_order: ChannelOrder,

    // === 输出 ===
    pub jpeg_quality: u8,
    pub bind_address: String,
    pub sndhwm: i32,
    pub fallback_fps: f64,

    // === 标注 ===
    pub font_path: Option<PathBuf>,
    pub font_px: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("MobileNetSSD_deploy.onnx"),
            labels: None,
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            prefer_accelerated: false,
            input_size: SSD_INPUT_SIZE,
            input_scale: SSD_SCALE,
            input_mean: SSD_MEAN,
            channel_order: ChannelOrder::Bgr,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            sndhwm: DEFAULT_SNDHWM,
            fallback_fps: DEFAULT_FPS,
            font_path: None,
            font_px: 16.0,
        }
    }
}

impl PipelineConfig {
    /// 从 JSON 文件加载; 文件缺失或内容非法均为启动错误
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InitError> {
        let path = path.as_ref();
        let config_err = |reason: String| InitError::Config {
            path: path.display().to_string(),
            reason,
        };
        let json = fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        let config: Self = serde_json::from_str(&json).map_err(|e| config_err(e.to_string()))?;
        config.validate().map_err(config_err)?;

        info!("✅ config loaded from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            return Err(format!(
                "conf_threshold {} outside [0, 1]",
                self.conf_threshold
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!("jpeg_quality {} outside 1..=100", self.jpeg_quality));
        }
        if self.input_size == 0 {
            return Err("input_size must be positive".into());
        }
        if self.bind_address.trim().is_empty() {
            return Err("bind_address is empty".into());
        }
        Ok(())
    }

    pub fn blob_params(&self) -> BlobParams {
        BlobParams {
            size: self.input_size,
            scale: self.input_scale,
            mean: self.input_mean,
            order: self.channel_order,
        }
    }

    /// 命令行覆盖
    pub fn apply_args(mut self, args: &Args) -> Self {
        if let Some(model) = &args.model {
            self.model = model.clone();
        }
        if let Some(labels) = &args.labels {
            self.labels = Some(labels.clone());
        }
        if let Some(conf) = args.conf {
            self.conf_threshold = conf;
        }
        if let Some(bind) = &args.bind {
            self.bind_address = bind.clone();
        }
        if let Some(quality) = args.quality {
            self.jpeg_quality = quality;
        }
        if args.accel {
            self.prefer_accelerated = true;
        }
        if let Some(fps) = args.fps {
            self.fallback_fps = fps;
        }
        if let Some(sndhwm) = args.sndhwm {
            self.sndhwm = sndhwm;
        }
        if let Some(font) = &args.font {
            self.font_path = Some(font.clone());
        }
        self
    }
}

impl Args {
    /// 合并配置文件与命令行
    pub fn resolve(&self) -> Result<PipelineConfig, InitError> {
        let base = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        let config = base.apply_args(self);
        config.validate().map_err(|reason| InitError::Config {
            path: "<command line>".into(),
            reason,
        })?;
        Ok(config)
    }
}
