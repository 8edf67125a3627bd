// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 采集源 (Capture sources)
//!
//! 描述符规则:
//! - `camera` 或纯数字 → 本地设备 (需要 `ffmpeg` 特性)
//! - 目录 → 按文件名排序的图片序列
//! - 图片文件 → 单帧
//! - 其他文件或 URL → 交给 FFmpeg 解码 (需要 `ffmpeg` 特性)

use std::path::{Path, PathBuf};

use image::ImageFormat;
use tracing::{debug, info, warn};

use super::Frame;
use crate::errors::OpenError;

/// 未知或非正帧率时的回退值
pub const DEFAULT_FPS: f64 = 30.0;

/// 采集源契约. `None` 表示流结束, 之后不应再调用.
pub trait FrameSource {
    fn read_next_frame(&mut self) -> Option<Frame>;

    /// 源报告的帧率, 未知时 <= 0
    fn fps(&self) -> f64;

    fn release(&mut self) {}

    fn describe(&self) -> String;
}

/// 解析后的源描述符
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    Device(u32),
    Path(PathBuf),
    Url(String),
}

impl SourceDescriptor {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.eq_ignore_ascii_case("camera") {
            return Self::Device(0);
        }
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = text.parse() {
                return Self::Device(index);
            }
        }
        if text.contains("://") {
            return Self::Url(text.to_string());
        }
        Self::Path(PathBuf::from(text))
    }
}

/// 录像帧率: 源报告的正帧率优先, 否则使用回退值 (非正时为 30)
pub fn recording_fps(reported: f64, fallback: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported
    } else {
        effective_fps(fallback)
    }
}

/// 有效帧率: 非正或非有限值回退到 30
pub fn effective_fps(reported: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported
    } else {
        DEFAULT_FPS
    }
}

pub fn is_image_path(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok()
}

/// 打开采集源
pub fn open_source(descriptor: &str) -> Result<Box<dyn FrameSource>, OpenError> {
    match SourceDescriptor::parse(descriptor) {
        SourceDescriptor::Device(index) => open_device(index),
        SourceDescriptor::Url(url) => open_stream(&url),
        SourceDescriptor::Path(path) => {
            if !path.exists() {
                return Err(OpenError::NotFound(path.display().to_string()));
            }
            if path.is_dir() {
                Ok(Box::new(ImageSequenceSource::from_dir(&path)?))
            } else if is_image_path(&path) {
                Ok(Box::new(ImageSequenceSource::single(&path)))
            } else {
                open_stream(&path.to_string_lossy())
            }
        }
    }
}

#[cfg(feature = "ffmpeg")]
fn open_device(index: u32) -> Result<Box<dyn FrameSource>, OpenError> {
    Ok(Box::new(super::ffmpeg::FfmpegSource::camera(index)?))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_device(index: u32) -> Result<Box<dyn FrameSource>, OpenError> {
    Err(OpenError::Unsupported {
        descriptor: format!("camera {index}"),
        feature: "ffmpeg",
    })
}

#[cfg(feature = "ffmpeg")]
fn open_stream(url: &str) -> Result<Box<dyn FrameSource>, OpenError> {
    Ok(Box::new(super::ffmpeg::FfmpegSource::stream(url)?))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_stream(url: &str) -> Result<Box<dyn FrameSource>, OpenError> {
    Err(OpenError::Unsupported {
        descriptor: url.to_string(),
        feature: "ffmpeg",
    })
}

/// 图片序列源: 目录中按文件名排序的图片, 或单张图片
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    fps: f64,
    origin: String,
}

impl ImageSequenceSource {
    pub fn from_dir(dir: &Path) -> Result<Self, OpenError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image_path(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(OpenError::Empty(dir.display().to_string()));
        }
        paths.sort();

        info!("📂 image sequence {:?}: {} files", dir, paths.len());
        Ok(Self::from_paths(paths, dir.display().to_string()))
    }

    pub fn single(path: &Path) -> Self {
        Self::from_paths(vec![path.to_path_buf()], path.display().to_string())
    }

    pub fn from_paths(paths: Vec<PathBuf>, origin: String) -> Self {
        Self {
            paths,
            cursor: 0,
            fps: 0.0,
            origin,
        }
    }

    /// 图片序列没有内在帧率, 由调用方指定
    #[cfg(test)]
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn remaining(&self) -> usize {
        self.paths.len() - self.cursor
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_next_frame(&mut self) -> Option<Frame> {
        while self.cursor < self.paths.len() {
            let index = self.cursor;
            let path = &self.paths[index];
            self.cursor += 1;
            match image::open(path) {
                Ok(img) => {
                    debug!("read {:?} ({}x{})", path, img.width(), img.height());
                    return Some(Frame::new(img, index as u64));
                }
                Err(e) => warn!("⚠️ skipping unreadable image {:?}: {}", path, e),
            }
        }
        None
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn release(&mut self) {
        self.cursor = self.paths.len();
    }

    fn describe(&self) -> String {
        format!("images:{}", self.origin)
    }
}
