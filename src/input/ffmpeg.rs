// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! FFmpeg 解码源 (摄像头 / 视频文件 / 网络流)
//!
//! 解码线程通过 `FrameFilter` 取得 RGB24 帧, 经有界通道交给流水线.
//! 通道满时解码线程阻塞, 接收端释放后过滤器返回错误使 FFmpeg 退出.

use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use tracing::{debug, info, warn};

use super::source::FrameSource;
use super::Frame;
use crate::errors::OpenError;

const CHANNEL_CAPACITY: usize = 2;

/// 解码过滤器: FFmpeg 帧 → 紧凑 RGB24 → 通道
#[derive(Clone)]
struct CaptureFilter {
    tx: Sender<Frame>,
    index: u64,
    dropped: u64,
}

impl FrameFilter for CaptureFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ decode thread started");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: ez_ffmpeg::Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<ez_ffmpeg::Frame>, String> {
        let Some(rgb) = (unsafe { copy_rgb24(&frame) }) else {
            self.dropped += 1;
            if self.dropped <= 10 {
                warn!("⚠️ dropped corrupt frame (total {})", self.dropped);
            }
            return Ok(None);
        };

        let (w, h, data) = rgb;
        let Some(out) = Frame::from_rgb(w, h, data, self.index) else {
            return Ok(None);
        };
        self.index += 1;

        self.tx
            .send(out)
            .map_err(|_| "capture receiver released".to_string())?;
        Ok(None)
    }
}

/// 按行拷贝去掉 stride 填充
unsafe fn copy_rgb24(frame: &ez_ffmpeg::Frame) -> Option<(u32, u32, Vec<u8>)> {
    if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
        return None;
    }
    let raw = &*frame.as_ptr();
    if raw.width <= 0 || raw.height <= 0 || raw.data[0].is_null() {
        return None;
    }
    let (w, h) = (raw.width as usize, raw.height as usize);
    let stride = raw.linesize[0] as usize;
    let row = w * 3;
    if stride < row {
        return None;
    }

    let plane = std::slice::from_raw_parts(raw.data[0], stride * (h - 1) + row);
    let mut data = Vec::with_capacity(row * h);
    for y in 0..h {
        data.extend_from_slice(&plane[y * stride..y * stride + row]);
    }
    Some((w as u32, h as u32, data))
}

/// 读取视频流的平均帧率, 探测失败或未知时为 0
fn probe_fps(url: &str) -> f64 {
    match find_video_stream_info(url) {
        Ok(Some(StreamInfo::Video { avg_frame_rate, .. })) => {
            rational_fps(avg_frame_rate.num, avg_frame_rate.den)
        }
        Ok(_) => 0.0,
        Err(e) => {
            debug!("fps probe failed for {}: {}", url, e);
            0.0
        }
    }
}

fn rational_fps(num: i32, den: i32) -> f64 {
    if num <= 0 || den <= 0 {
        return 0.0;
    }
    num as f64 / den as f64
}

pub struct FfmpegSource {
    rx: Option<Receiver<Frame>>,
    worker: Option<JoinHandle<()>>,
    descriptor: String,
    fps: f64,
}

/// 解码线程内构造的输入参数
struct InputSpec {
    url: String,
    format: Option<&'static str>,
    rtsp_tcp: bool,
}

impl InputSpec {
    fn build(&self) -> Input {
        let mut input = Input::new(self.url.as_str());
        if let Some(format) = self.format {
            input = input.set_format(format);
        }
        if self.rtsp_tcp {
            input = input.set_input_opts([("rtsp_transport", "tcp")].into());
        }
        input
    }
}

impl FfmpegSource {
    /// 本地摄像头, 平台相关的输入格式
    pub fn camera(index: u32) -> Result<Self, OpenError> {
        #[cfg(target_os = "windows")]
        let (url, format) = (format!("video={index}"), "dshow");
        #[cfg(target_os = "macos")]
        let (url, format) = (format!("{index}"), "avfoundation");
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let (url, format) = (format!("/dev/video{index}"), "v4l2");

        // 设备不报告帧率, 由调用方回退
        Self::start(
            InputSpec {
                url,
                format: Some(format),
                rtsp_tcp: false,
            },
            0.0,
        )
    }

    /// 视频文件或网络流
    pub fn stream(url: &str) -> Result<Self, OpenError> {
        let fps = probe_fps(url);
        Self::start(
            InputSpec {
                url: url.to_string(),
                format: None,
                rtsp_tcp: url.starts_with("rtsp://"),
            },
            fps,
        )
    }

    fn start(spec: InputSpec, fps: f64) -> Result<Self, OpenError> {
        let descriptor = spec.url.clone();
        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);

        let worker = std::thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let filter = CaptureFilter {
                    tx,
                    index: 0,
                    dropped: 0,
                };
                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("capture", Box::new(filter));
                let out = create_null_output().add_frame_pipeline(pipe);

                let ctx = match FfmpegContext::builder()
                    .input(spec.build())
                    .filter_desc("format=rgb24")
                    .output(out)
                    .build()
                {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("build failed: {e}")));
                        return;
                    }
                };
                let sch = match ctx.start() {
                    Ok(sch) => sch,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("start failed: {e}")));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                if let Err(e) = sch.wait() {
                    warn!("decoder exited: {}", e);
                }
            })?;

        let decoder_err = |reason: String| OpenError::Decoder {
            descriptor: descriptor.clone(),
            reason,
        };
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                let _ = worker.join();
                return Err(decoder_err(reason));
            }
            Err(_) => {
                let _ = worker.join();
                return Err(decoder_err("decoder thread exited".into()));
            }
        }

        info!("✅ decoder started for {} ({} fps reported)", descriptor, fps);
        Ok(Self {
            rx: Some(rx),
            worker: Some(worker),
            descriptor,
            fps,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn read_next_frame(&mut self) -> Option<Frame> {
        self.rx.as_ref()?.recv().ok()
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn release(&mut self) {
        // 先丢弃接收端, 解码线程在下一次发送时退出
        self.rx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn describe(&self) -> String {
        format!("ffmpeg:{}", self.descriptor)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_fps() {
        assert_eq!(rational_fps(25, 1), 25.0);
        assert!((rational_fps(30000, 1001) - 29.97).abs() < 1e-2);
        assert_eq!(rational_fps(0, 1), 0.0);
        assert_eq!(rational_fps(25, 0), 0.0);
    }
}
